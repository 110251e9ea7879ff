//! Buffered Byte Window
//!
//! Reads from any source implementing Read into a growable window, so the
//! lexer can look at a whole token even when it straddles two reads.

use std::io::{self, Read};

use crate::context::DEFAULT_CHUNK_SIZE;

/// Refillable window over a `Read` source
pub struct BufferedReader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    pos: usize,
    /// Absolute input offset of `buffer[0]`
    base_offset: usize,
    chunk_size: usize,
    eof: bool,
}

impl<R: Read> BufferedReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        BufferedReader {
            reader,
            buffer: Vec::with_capacity(chunk_size.max(1)),
            pos: 0,
            base_offset: 0,
            chunk_size: chunk_size.max(1),
            eof: false,
        }
    }

    /// Read one more chunk, keeping unconsumed bytes.
    /// Returns `false` once the reader is exhausted.
    pub fn fill(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        // Compact: drop consumed bytes
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.base_offset += self.pos;
            self.pos = 0;
        }

        let old_len = self.buffer.len();
        self.buffer.resize(old_len + self.chunk_size, 0);
        let read = loop {
            match self.reader.read(&mut self.buffer[old_len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(old_len);
                    return Err(e);
                }
            }
        };
        self.buffer.truncate(old_len + read);

        if read == 0 {
            self.eof = true;
            Ok(false)
        } else {
            Ok(true)
        }
    }

    /// Unconsumed bytes currently in the window
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.pos..]
    }

    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.pos += n.min(self.buffer.len() - self.pos);
    }

    /// Absolute offset of the first unconsumed byte
    #[inline]
    pub fn offset(&self) -> usize {
        self.base_offset + self.pos
    }

    /// The underlying reader reported end of input
    #[inline]
    pub fn reader_exhausted(&self) -> bool {
        self.eof
    }

    /// Exhausted and nothing left to consume
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof && self.pos >= self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_buffered_reader() {
        let data = b"<root>content</root>";
        let mut reader = BufferedReader::new(Cursor::new(data.to_vec()));

        reader.fill().unwrap();
        assert_eq!(reader.buffered(), data);
        assert!(!reader.fill().unwrap());
        assert!(reader.reader_exhausted());
    }

    #[test]
    fn test_small_chunks_keep_unconsumed_bytes() {
        let mut reader = BufferedReader::with_chunk_size(Cursor::new(b"abcdef".to_vec()), 2);
        reader.fill().unwrap();
        assert_eq!(reader.buffered(), b"ab");
        reader.consume(1);
        reader.fill().unwrap();
        assert_eq!(reader.buffered(), b"bcd");
        assert_eq!(reader.offset(), 1);
        reader.consume(3);
        assert_eq!(reader.offset(), 4);
        reader.fill().unwrap();
        reader.consume(2);
        assert!(!reader.fill().unwrap());
        assert!(reader.is_eof());
    }
}
