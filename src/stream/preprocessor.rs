//! Stream Pre-Processor - the pull boundary between input and buffer
//!
//! Owns the token source, the tracker (and through it the buffer) and the
//! run context. `read_next` is the only place the token source advances.

use std::fs::File;
use std::path::Path;

use tracing::{debug, trace};

use super::tracker::StreamTracker;
use super::DocumentStream;
use crate::automaton::{Automaton, ProjectionAutomaton};
use crate::buffer::Buffer;
use crate::context::RunContext;
use crate::core::XmlLexer;
use crate::error::Result;
use crate::reader::{TokenSource, XmlToken};

pub struct StreamPreProcessor<S: TokenSource, A: ProjectionAutomaton = Automaton> {
    source: S,
    tracker: StreamTracker<A>,
    context: RunContext,
    tokens_read: u64,
    exhausted: bool,
}

impl<A: ProjectionAutomaton> StreamPreProcessor<XmlLexer<File>, A> {
    /// Open an XML file; fails before anything is buffered if the file
    /// cannot be opened.
    pub fn open(path: impl AsRef<Path>, automaton: A, context: RunContext) -> Result<Self> {
        let lexer = XmlLexer::open(path, &context.options)?;
        Ok(Self::new(lexer, automaton, context))
    }
}

impl<'a, A: ProjectionAutomaton> StreamPreProcessor<XmlLexer<&'a [u8]>, A> {
    pub fn from_bytes(input: &'a [u8], automaton: A, context: RunContext) -> Self {
        let lexer = XmlLexer::from_bytes(input, &context.options);
        Self::new(lexer, automaton, context)
    }
}

impl<S: TokenSource, A: ProjectionAutomaton> StreamPreProcessor<S, A> {
    pub fn new(source: S, automaton: A, context: RunContext) -> Self {
        StreamPreProcessor {
            source,
            tracker: StreamTracker::new(automaton),
            context,
            tokens_read: 0,
            exhausted: false,
        }
    }

    pub fn tracker(&self) -> &StreamTracker<A> {
        &self.tracker
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RunContext {
        &mut self.context
    }

    /// Tokens pulled from the source so far
    pub fn tokens_read(&self) -> u64 {
        self.tokens_read
    }

    /// True once the source is drained and the root has been closed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Pull one token and apply it to the buffer.
    ///
    /// When the source runs dry this closes the virtual root instead.
    /// Returns `false` only when called after that, without doing anything.
    pub fn read_next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let position = self.source.position();
        let token = self
            .source
            .next_token()
            .map_err(|e| e.with_position(position))?;

        let Some(token) = token else {
            self.exhausted = true;
            self.tracker
                .finish()
                .map_err(|e| e.with_position(self.source.position()))?;
            debug!(
                tokens = self.tokens_read,
                peak = self.tracker.buffer().stats().peak,
                "input exhausted"
            );
            return Ok(true);
        };

        self.tokens_read += 1;
        trace!(%token, "dispatch");
        let tags = &mut self.context.tags;
        let applied = match token {
            XmlToken::Open(name) => self.tracker.on_open(tags, &name),
            XmlToken::Bachelor(name) => self.tracker.on_bachelor(tags, &name),
            XmlToken::Close(_) => self.tracker.on_close(),
            XmlToken::Text(text) => self.tracker.on_text(text),
        };
        applied.map_err(|e| e.with_position(position))?;
        Ok(true)
    }

    /// Drain the whole source into the buffer
    pub fn read_all(&mut self) -> Result<()> {
        while self.read_next()? {}
        Ok(())
    }

    /// Give up the run's state
    pub fn into_parts(self) -> (Buffer, RunContext) {
        let StreamPreProcessor {
            tracker, context, ..
        } = self;
        (tracker.into_buffer(), context)
    }
}

impl<S: TokenSource, A: ProjectionAutomaton> DocumentStream for StreamPreProcessor<S, A> {
    fn buffer(&self) -> &Buffer {
        self.tracker.buffer()
    }

    fn buffer_mut(&mut self) -> &mut Buffer {
        self.tracker.buffer_mut()
    }

    fn read_next(&mut self) -> Result<bool> {
        StreamPreProcessor::read_next(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reader::TokenQueue;

    fn keep_all(xml: &str) -> StreamPreProcessor<XmlLexer<&[u8]>> {
        StreamPreProcessor::from_bytes(
            xml.as_bytes(),
            Automaton::keep_everything(),
            RunContext::new(),
        )
    }

    #[test]
    fn test_read_next_pulls_one_token() {
        let mut pre = keep_all("<a><b>1</b></a>");
        assert!(pre.read_next().unwrap());
        assert_eq!(pre.tokens_read(), 1);
        let root = pre.buffer().root();
        let a = pre.buffer().first_child(root).unwrap();
        assert!(!pre.buffer().is_closed(a));
        assert_eq!(pre.buffer().child_count(a), 0);
    }

    #[test]
    fn test_exhaustion_closes_root_once() {
        let mut pre = keep_all("<a/>");
        assert!(pre.read_next().unwrap());
        assert!(!pre.is_exhausted());
        assert!(pre.read_next().unwrap());
        assert!(pre.is_exhausted());
        assert!(pre.buffer().is_closed(pre.buffer().root()));
        assert!(!pre.read_next().unwrap());
        assert_eq!(pre.tokens_read(), 1);
    }

    #[test]
    fn test_read_all() {
        let mut pre = keep_all("<a><b>1</b><b>2</b></a>");
        pre.read_all().unwrap();
        let root = pre.buffer().root();
        assert_eq!(pre.buffer().text_content(root), "12");
        assert_eq!(pre.tokens_read(), 8);
        let (buffer, context) = pre.into_parts();
        assert_eq!(buffer.stats().appended, 5);
        assert!(context.tags.lookup("b").is_some());
    }

    #[test]
    fn test_close_without_open_carries_position() {
        let tokens: TokenQueue = [XmlToken::bachelor("a"), XmlToken::close("c")]
            .into_iter()
            .collect();
        let mut pre = StreamPreProcessor::new(tokens, Automaton::keep_everything(), RunContext::new());
        pre.read_next().unwrap();
        let err = pre.read_next().unwrap_err();
        assert!(matches!(err, Error::Malformed { position: Some(1), .. }));
    }

    #[test]
    fn test_truncated_token_stream() {
        let tokens: TokenQueue = [XmlToken::open("a")].into_iter().collect();
        let mut pre = StreamPreProcessor::new(tokens, Automaton::keep_everything(), RunContext::new());
        let err = pre.read_all().unwrap_err();
        assert!(err.to_string().contains("premature end of input"));
    }

    #[test]
    fn test_missing_file_fails_before_buffering() {
        let err = StreamPreProcessor::open(
            "/no/such/input.xml",
            Automaton::keep_everything(),
            RunContext::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
