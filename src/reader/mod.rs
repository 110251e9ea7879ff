//! Token Reader Module
//!
//! The pull boundary between raw input and the tracker:
//! - XmlToken: the four token shapes the engine consumes
//! - TokenSource: anything that yields tokens on demand
//! - BufferedReader: refillable byte window used by the lexer

pub mod buffered;
pub mod events;
pub mod source;

pub use buffered::BufferedReader;
pub use events::{TokenKind, XmlToken};
pub use source::{TokenQueue, TokenSource};
