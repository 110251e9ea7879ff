//! Path evaluation over the streaming buffer
//!
//! - `step`: axes, node tests and path expressions
//! - `parser`: path text to [`PathExpr`]
//! - `iterator`: the streaming matcher, [`BufferIterator`]
//! - `eager`: set evaluation over a materialized buffer

mod eager;
mod iterator;
mod parser;
mod step;

pub use eager::{evaluate_eager, evaluate_parallel};
pub use iterator::{BufferIterator, IteratorOptions, LockPolicy, ReadPolicy};
pub use parser::parse_path;
pub use step::{Axis, NodeTest, PathExpr, PathStep};
