//! Token Sources
//!
//! The stream pre-processor owns exactly one `TokenSource` and is the only
//! component that advances it.

use std::collections::VecDeque;

use super::events::XmlToken;
use crate::error::Result;

/// A pull-style supplier of tokens
pub trait TokenSource {
    /// Next token, or `None` once the input is exhausted
    fn next_token(&mut self) -> Result<Option<XmlToken>>;

    /// Position used in error reports (byte offset or token index)
    fn position(&self) -> usize;
}

/// Pre-built token sequence, for tests and replays
#[derive(Debug, Default, Clone)]
pub struct TokenQueue {
    tokens: VecDeque<XmlToken>,
    delivered: usize,
}

impl TokenQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: XmlToken) {
        self.tokens.push_back(token);
    }

    /// Tokens not yet handed out
    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }
}

impl FromIterator<XmlToken> for TokenQueue {
    fn from_iter<I: IntoIterator<Item = XmlToken>>(iter: I) -> Self {
        TokenQueue {
            tokens: iter.into_iter().collect(),
            delivered: 0,
        }
    }
}

impl TokenSource for TokenQueue {
    fn next_token(&mut self) -> Result<Option<XmlToken>> {
        let token = self.tokens.pop_front();
        if token.is_some() {
            self.delivered += 1;
        }
        Ok(token)
    }

    fn position(&self) -> usize {
        self.delivered
    }
}
