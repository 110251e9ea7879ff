//! RustyGCX - streaming XML query buffer
//!
//! Evaluates path queries against a document that arrives as a token
//! stream, keeping in memory only what pending query work may still need:
//!
//! 1. Lexing: `core::XmlLexer` pulls open/bachelor/close/text tokens from
//!    any reader, one chunk at a time.
//! 2. Projection: `stream::StreamTracker` runs each token through the
//!    projection automaton and materializes only the relevant nodes.
//! 3. Pulling: `stream::StreamPreProcessor` is the single place the input
//!    advances; everything else asks it for one more token.
//! 4. Matching: `path::BufferIterator` walks the buffer in document order
//!    and pulls input only when the walk reaches the materialized edge.
//! 5. Collection: signing off a role or releasing a lock removes every
//!    node no pending operation can reach again.
//!
//! ```ignore
//! let mut ctx = RunContext::new();
//! let path = parse_path("//item/price", &mut ctx.tags)?;
//! let mut stream = StreamPreProcessor::open("feed.xml", Automaton::keep_everything(), ctx)?;
//! let mut iter = BufferIterator::new(stream.buffer().root(), path);
//! while let Some(node) = iter.get_next(&mut stream, ReadPolicy::UpToResultClose, LockPolicy::LockEagerGc)? {
//!     println!("{}", stream.buffer().text_content(node));
//! }
//! ```

pub mod automaton;
pub mod buffer;
pub mod context;
pub mod core;
pub mod error;
pub mod path;
pub mod reader;
pub mod stream;
pub mod tags;

pub use automaton::{Automaton, AutomatonBuilder, ProjectionAutomaton, Transition, TransitionKind};
pub use buffer::{Buffer, BufferNode, BufferStats, NodeId, NodeKind};
pub use context::{RunContext, StreamOptions};
pub use error::{Error, Result};
pub use path::{
    evaluate_eager, evaluate_parallel, parse_path, BufferIterator, IteratorOptions, LockPolicy,
    PathExpr, ReadPolicy,
};
pub use reader::{TokenQueue, TokenSource, XmlToken};
pub use stream::{DocumentStream, StreamPreProcessor, StreamTracker};
pub use tags::{RoleId, TagId, TagTable};
