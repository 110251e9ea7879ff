//! Delimiter scanning using memchr
//!
//! Works on the lexer's current byte window. Every search returns `None`
//! when the delimiter is not in the window yet, which the lexer treats as
//! "refill and retry".

use memchr::{memchr, memmem};

/// Scanner over one window of input bytes
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && is_whitespace(self.input[self.pos]) {
            self.pos += 1;
        }
    }

    /// Next occurrence of `byte` at or after the current position
    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Start of the next occurrence of `needle`
    #[inline]
    pub fn find_sequence(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(&self.input[self.pos..], needle).map(|i| self.pos + i)
    }

    /// Position of the first '>' that is not inside a quoted attribute value
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let mut in_single_quote = false;
        let mut in_double_quote = false;

        for (i, &b) in self.input[self.pos..].iter().enumerate() {
            match b {
                b'"' if !in_single_quote => in_double_quote = !in_double_quote,
                b'\'' if !in_double_quote => in_single_quote = !in_single_quote,
                b'>' if !in_single_quote && !in_double_quote => return Some(self.pos + i),
                _ => {}
            }
        }
        None
    }

    /// End of a `<!...>` declaration, skipping a bracketed internal subset
    pub fn find_declaration_end(&self) -> Option<usize> {
        let mut bracket_depth = 0usize;
        let mut quote: Option<u8> = None;

        for (i, &b) in self.input[self.pos..].iter().enumerate() {
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => bracket_depth += 1,
                (None, b']') => bracket_depth = bracket_depth.saturating_sub(1),
                (None, b'>') if bracket_depth == 0 => return Some(self.pos + i),
                _ => {}
            }
        }
        None
    }

    /// Read an XML name and advance past it
    pub fn read_name(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        let first = *self.input.get(start)?;
        if !is_name_start_char(first) {
            return None;
        }

        self.pos += 1;
        while self.pos < self.input.len() && is_name_char(self.input[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// True when every byte is XML whitespace
#[inline]
pub fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| is_whitespace(b))
}

/// ASCII letters, underscore, colon, and non-ASCII (UTF-8 lead/continuation)
#[inline]
fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

#[inline]
fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tag_end_quoted() {
        let scanner = Scanner::new(b"<a attr=\">test\">content");
        assert_eq!(scanner.find_tag_end_quoted(), Some(15));
    }

    #[test]
    fn test_find_tag_end_incomplete() {
        let scanner = Scanner::new(b"<a attr=\">te");
        assert_eq!(scanner.find_tag_end_quoted(), None);
    }

    #[test]
    fn test_declaration_with_internal_subset() {
        let scanner = Scanner::new(b"<!DOCTYPE a [<!ENTITY x \"y>\">]>rest");
        assert_eq!(scanner.find_declaration_end(), Some(30));
    }

    #[test]
    fn test_read_name() {
        let mut scanner = Scanner::new(b"element-name>");
        assert_eq!(scanner.read_name(), Some(b"element-name" as &[u8]));
        assert_eq!(scanner.position(), 12);
    }

    #[test]
    fn test_find_sequence_from_position() {
        let mut scanner = Scanner::new(b"<!-- a -- b -->x");
        scanner.set_position(4);
        assert_eq!(scanner.find_sequence(b"-->"), Some(12));
        assert!(is_blank(b" \n\t"));
        assert!(!is_blank(b" x "));
    }
}
