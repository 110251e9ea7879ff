//! XML Tokenizer - incremental pull lexer
//!
//! Extracts the four token shapes the engine consumes from any `Read`:
//! - Open tags `<a ...>`
//! - Bachelor (self-closing) tags `<a .../>`
//! - Close tags `</a>`
//! - Text content (entity-decoded) and CDATA sections
//!
//! The XML declaration, processing instructions, comments and DOCTYPE are
//! consumed silently. Attributes are skipped; the buffer model has none.
//! Input is pulled one chunk at a time, so a token may straddle refills.

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::trace;

use super::entities::decode_text;
use super::scanner::{is_blank, Scanner};
use crate::context::StreamOptions;
use crate::error::{Error, Result};
use crate::reader::{BufferedReader, TokenSource, XmlToken};

const CDATA_OPEN: &[u8] = b"<![CDATA[";

/// Result of looking at markup in the current window
enum Markup {
    /// Token (or `None` for skipped markup) and its byte length
    Complete(Option<XmlToken>, usize),
    /// The closing delimiter is not in the window yet
    Incomplete,
}

/// Incremental XML lexer implementing `TokenSource`
pub struct XmlLexer<R: Read> {
    input: BufferedReader<R>,
    strict: bool,
    skip_whitespace_text: bool,
    /// Names of currently open elements (strict mode only)
    open_names: Vec<String>,
    /// Offset of the token most recently returned
    token_start: usize,
}

impl XmlLexer<File> {
    /// Open a file as token source
    pub fn open(path: impl AsRef<Path>, options: &StreamOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file, options))
    }
}

impl<'a> XmlLexer<&'a [u8]> {
    /// Lex an in-memory document
    pub fn from_bytes(input: &'a [u8], options: &StreamOptions) -> Self {
        Self::new(input, options)
    }
}

impl<R: Read> XmlLexer<R> {
    pub fn new(reader: R, options: &StreamOptions) -> Self {
        XmlLexer {
            input: BufferedReader::with_chunk_size(reader, options.chunk_size),
            strict: options.strict,
            skip_whitespace_text: options.skip_whitespace_text,
            open_names: Vec::new(),
            token_start: 0,
        }
    }

    /// Current nesting depth as seen by the lexer (strict mode only)
    pub fn depth(&self) -> usize {
        self.open_names.len()
    }

    fn lex_next(&mut self) -> Result<Option<XmlToken>> {
        loop {
            if self.input.buffered().is_empty() && !self.input.fill()? {
                return self.finish();
            }

            let start = self.input.offset();
            let at_eof = self.input.reader_exhausted();
            let window = self.input.buffered();

            if window[0] == b'<' {
                match scan_markup(window, at_eof, start)? {
                    Markup::Complete(token, len) => {
                        self.input.consume(len);
                        if let Some(token) = token {
                            self.token_start = start;
                            return self.check_nesting(token, start).map(Some);
                        }
                    }
                    Markup::Incomplete => {
                        if !self.input.fill()? && at_eof {
                            return Err(Error::malformed_at("unterminated markup", start));
                        }
                    }
                }
                continue;
            }

            // Character data runs up to the next '<'
            let text_len = match memchr::memchr(b'<', window) {
                Some(i) => i,
                None if at_eof => window.len(),
                None => {
                    self.input.fill()?;
                    continue;
                }
            };

            let raw = &window[..text_len];
            let token = if self.skip_whitespace_text && is_blank(raw) {
                None
            } else {
                Some(XmlToken::Text(utf8(decode_text(raw), start)?))
            };
            self.input.consume(text_len);
            if let Some(token) = token {
                self.token_start = start;
                return Ok(Some(token));
            }
        }
    }

    fn check_nesting(&mut self, token: XmlToken, start: usize) -> Result<XmlToken> {
        if !self.strict {
            return Ok(token);
        }
        match &token {
            XmlToken::Open(name) => self.open_names.push(name.clone()),
            XmlToken::Close(name) => match self.open_names.pop() {
                Some(open) if &open == name => {}
                Some(open) => {
                    return Err(Error::malformed_at(
                        format!("close tag </{name}> does not match open tag <{open}>"),
                        start,
                    ))
                }
                None => {
                    return Err(Error::malformed_at(
                        format!("close tag </{name}> without matching open tag"),
                        start,
                    ))
                }
            },
            _ => {}
        }
        Ok(token)
    }

    fn finish(&mut self) -> Result<Option<XmlToken>> {
        if let Some(open) = self.open_names.last() {
            return Err(Error::malformed_at(
                format!(
                    "premature end of input: <{open}> and {} more element(s) still open",
                    self.open_names.len() - 1
                ),
                self.input.offset(),
            ));
        }
        Ok(None)
    }
}

impl<R: Read> TokenSource for XmlLexer<R> {
    fn next_token(&mut self) -> Result<Option<XmlToken>> {
        let token = self.lex_next()?;
        if let Some(token) = &token {
            trace!(offset = self.token_start, %token, "lexed token");
        }
        Ok(token)
    }

    fn position(&self) -> usize {
        self.input.offset()
    }
}

/// Classify the markup starting at `window[0] == b'<'`
fn scan_markup(window: &[u8], at_eof: bool, offset: usize) -> Result<Markup> {
    let mut scanner = Scanner::new(window);

    // Too short to tell a comment from CDATA or a declaration yet
    if window.len() < CDATA_OPEN.len() && window.get(1) == Some(&b'!') && !at_eof {
        return Ok(Markup::Incomplete);
    }

    if window.starts_with(b"<?") {
        scanner.set_position(2);
        return Ok(match scanner.find_sequence(b"?>") {
            Some(end) => Markup::Complete(None, end + 2),
            None => Markup::Incomplete,
        });
    }

    if window.starts_with(b"<!--") {
        scanner.set_position(4);
        return Ok(match scanner.find_sequence(b"-->") {
            Some(end) => Markup::Complete(None, end + 3),
            None => Markup::Incomplete,
        });
    }

    if window.starts_with(CDATA_OPEN) {
        scanner.set_position(CDATA_OPEN.len());
        return Ok(match scanner.find_sequence(b"]]>") {
            Some(end) => {
                let content = utf8(Cow::Borrowed(&window[CDATA_OPEN.len()..end]), offset)?;
                Markup::Complete(Some(XmlToken::Text(content)), end + 3)
            }
            None => Markup::Incomplete,
        });
    }

    if window.starts_with(b"<!") {
        return Ok(match scanner.find_declaration_end() {
            Some(end) => Markup::Complete(None, end + 1),
            None => Markup::Incomplete,
        });
    }

    if window.starts_with(b"</") {
        let Some(end) = scanner.find_byte(b'>') else {
            return Ok(Markup::Incomplete);
        };
        scanner.set_position(2);
        let name = tag_name(&mut scanner, offset)?;
        scanner.skip_whitespace();
        if scanner.position() != end {
            return Err(Error::malformed_at("unexpected content in close tag", offset));
        }
        return Ok(Markup::Complete(Some(XmlToken::Close(name)), end + 1));
    }

    let Some(end) = scanner.find_tag_end_quoted() else {
        return Ok(Markup::Incomplete);
    };
    scanner.set_position(1);
    let name = tag_name(&mut scanner, offset)?;
    let token = if window[end - 1] == b'/' {
        XmlToken::Bachelor(name)
    } else {
        XmlToken::Open(name)
    };
    Ok(Markup::Complete(Some(token), end + 1))
}

fn tag_name(scanner: &mut Scanner<'_>, offset: usize) -> Result<String> {
    let name = scanner
        .read_name()
        .ok_or_else(|| Error::malformed_at("missing tag name", offset))?;
    utf8(Cow::Borrowed(name), offset)
}

fn utf8(bytes: Cow<'_, [u8]>, offset: usize) -> Result<String> {
    String::from_utf8(bytes.into_owned())
        .map_err(|_| Error::malformed_at("invalid UTF-8 in input", offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &str, options: &StreamOptions) -> Result<Vec<XmlToken>> {
        let mut lexer = XmlLexer::from_bytes(input.as_bytes(), options);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[test]
    fn test_basic_tokens() {
        let tokens = lex_all("<a><b>1</b><c/></a>", &StreamOptions::default()).unwrap();
        assert_eq!(
            tokens,
            vec![
                XmlToken::open("a"),
                XmlToken::open("b"),
                XmlToken::text("1"),
                XmlToken::close("b"),
                XmlToken::bachelor("c"),
                XmlToken::close("a"),
            ]
        );
    }

    #[test]
    fn test_tiny_chunks_give_same_tokens() {
        let doc = "<?xml version=\"1.0\"?><!-- hi --><a x=\"1>2\"><b>one &amp; two</b>\
                   <![CDATA[<raw>]]><c y='/'/></a>";
        let whole = lex_all(doc, &StreamOptions::default()).unwrap();
        for chunk in 1..7 {
            let chunked =
                lex_all(doc, &StreamOptions::default().with_chunk_size(chunk)).unwrap();
            assert_eq!(chunked, whole, "chunk size {chunk}");
        }
        assert_eq!(whole[2], XmlToken::text("one & two"));
        assert_eq!(whole[4], XmlToken::text("<raw>"));
        assert_eq!(whole[5], XmlToken::bachelor("c"));
    }

    #[test]
    fn test_whitespace_text_skipped_by_default() {
        let tokens = lex_all("<a>\n  <b/>\n</a>", &StreamOptions::default()).unwrap();
        assert_eq!(tokens.len(), 3);

        let keep = StreamOptions::default().with_skip_whitespace_text(false);
        let tokens = lex_all("<a>\n  <b/>\n</a>", &keep).unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1], XmlToken::text("\n  "));
    }

    #[test]
    fn test_doctype_skipped() {
        let tokens = lex_all(
            "<!DOCTYPE a [<!ELEMENT a (#PCDATA)>]><a>t</a>",
            &StreamOptions::default(),
        )
        .unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_strict_mismatched_close() {
        let err = lex_all("<a><b>1</b></c></a>", &StreamOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Malformed { position: Some(11), .. }));
    }

    #[test]
    fn test_lenient_mode_passes_mismatch_through() {
        let lenient = StreamOptions::default().with_strict(false);
        let tokens = lex_all("<a></c>", &lenient).unwrap();
        assert_eq!(tokens, vec![XmlToken::open("a"), XmlToken::close("c")]);
    }

    #[test]
    fn test_premature_end() {
        let err = lex_all("<a><b>", &StreamOptions::default()).unwrap_err();
        assert!(err.to_string().contains("premature end of input"));

        let err = lex_all("<a><b", &StreamOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unterminated markup"));
    }

    #[test]
    fn test_missing_file() {
        let err = XmlLexer::open("/definitely/not/here.xml", &StreamOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
