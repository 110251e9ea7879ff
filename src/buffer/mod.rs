//! Streaming buffer
//!
//! The in-memory, partially built document tree shared by the stream
//! pre-processor (which appends) and any number of path iterators (which
//! navigate, lock, and sign off roles).

mod arena;
mod document;
mod list;
mod node;

pub use document::{Buffer, BufferStats};
pub use list::{NodeList, Siblings};
pub use node::{BufferNode, NodeId, NodeKind, Roles};
