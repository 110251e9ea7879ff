//! Streaming front half of a query run
//!
//! [`StreamTracker`] turns token events into buffer mutations under the
//! control of the projection automaton; [`StreamPreProcessor`] owns the
//! token source and exposes it one token at a time.
//!
//! Path iterators never see either type directly. They pull through
//! [`DocumentStream`], so they work the same over a live stream and over
//! a buffer that is already complete.

mod preprocessor;
mod tracker;

pub use preprocessor::StreamPreProcessor;
pub use tracker::StreamTracker;

use crate::buffer::Buffer;
use crate::error::Result;

/// A buffer plus the means to grow it on demand
pub trait DocumentStream {
    fn buffer(&self) -> &Buffer;

    fn buffer_mut(&mut self) -> &mut Buffer;

    /// Apply one more token. `false` means nothing more will ever arrive.
    fn read_next(&mut self) -> Result<bool>;

    fn read_all(&mut self) -> Result<()> {
        while self.read_next()? {}
        Ok(())
    }
}

/// A standalone buffer never grows
impl DocumentStream for Buffer {
    fn buffer(&self) -> &Buffer {
        self
    }

    fn buffer_mut(&mut self) -> &mut Buffer {
        self
    }

    fn read_next(&mut self) -> Result<bool> {
        Ok(false)
    }
}
