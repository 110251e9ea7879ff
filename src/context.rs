//! Per-run state and configuration
//!
//! Everything that used to be process-wide (tag table, role list, parser
//! switches) lives in one `RunContext` constructed for a single query run.

use crate::tags::{RoleTable, TagTable};

/// Default number of bytes read per lexer refill
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Input handling switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Require close-tag names to match their open tag
    pub strict: bool,
    /// Drop whitespace-only text between tags
    pub skip_whitespace_text: bool,
    /// Bytes read from the underlying reader per refill
    pub chunk_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            strict: true,
            skip_whitespace_text: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamOptions {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_skip_whitespace_text(mut self, skip: bool) -> Self {
        self.skip_whitespace_text = skip;
        self
    }

    /// Chunk sizes below 1 are raised to 1
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// State scoped to exactly one query execution
#[derive(Debug, Default)]
pub struct RunContext {
    pub tags: TagTable,
    pub roles: RoleTable,
    pub options: StreamOptions,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StreamOptions) -> Self {
        RunContext {
            tags: TagTable::new(),
            roles: RoleTable::new(),
            options,
        }
    }
}
