//! Core XML lexing primitives
//!
//! - Scanner: memchr-accelerated delimiter detection over the lexer window
//! - Entities: entity decoding with Cow (zero-copy when possible)
//! - Tokenizer: incremental pull lexer producing open/bachelor/close/text

pub mod entities;
pub mod scanner;
pub mod tokenizer;

pub use tokenizer::XmlLexer;
