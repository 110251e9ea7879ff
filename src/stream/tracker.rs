//! Stream Tracker - token events to buffer mutations
//!
//! Consults the projection automaton for every token and decides whether
//! it is materialized in the buffer, dropped, or kept as part of a
//! forced keep-subtree region. Inside a skip or keep region the automaton
//! is not consulted; two depth counters track the nesting instead.

use tracing::trace;

use crate::automaton::{Automaton, ProjectionAutomaton, StateId, TransitionKind};
use crate::buffer::{Buffer, NodeId};
use crate::error::{Error, Result};
use crate::tags::{TagId, TagTable};

/// Automaton state in force before an open tag, and whether that open
/// appended a buffer node that the matching close must close.
#[derive(Debug, Clone, Copy)]
struct Trace {
    state: StateId,
    appended: bool,
}

pub struct StreamTracker<A: ProjectionAutomaton = Automaton> {
    automaton: A,
    buffer: Buffer,
    state: StateId,
    trace: Vec<Trace>,
    skip_depth: usize,
    keep_depth: usize,
}

impl<A: ProjectionAutomaton> StreamTracker<A> {
    /// Bind a fresh buffer to the automaton's initial state; the root
    /// takes that state's roles.
    pub fn new(automaton: A) -> Self {
        let state = automaton.initial_state();
        let buffer = Buffer::new(
            automaton.cumulative_roles(state),
            automaton.non_cumulative_roles(state),
        );
        StreamTracker {
            automaton,
            buffer,
            state,
            trace: Vec::new(),
            skip_depth: 0,
            keep_depth: 0,
        }
    }

    #[inline]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }

    pub fn automaton(&self) -> &A {
        &self.automaton
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn skip_depth(&self) -> usize {
        self.skip_depth
    }

    pub fn keep_depth(&self) -> usize {
        self.keep_depth
    }

    /// Open tag. Returns the appended node, if any.
    pub fn on_open(&mut self, tags: &mut TagTable, name: &str) -> Result<Option<NodeId>> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(None);
        }
        let tag = tags.intern(name);
        if self.keep_depth > 0 {
            self.keep_depth += 1;
            return self.buffer.append_tag(tag, &[], &[]).map(Some);
        }

        let transition = self.automaton.transition(self.state, tag);
        match transition.kind {
            TransitionKind::Regular => {
                let target = transition.target;
                let keep = self.automaton.keep_node(target);
                let node = if keep {
                    Some(self.append_tag_in(target, tag)?)
                } else {
                    None
                };
                self.trace.push(Trace {
                    state: self.state,
                    appended: keep,
                });
                self.state = target;
                trace!(%tag, state = target, kept = keep, "open");
                Ok(node)
            }
            TransitionKind::SkipSubtree => {
                self.skip_depth = 1;
                trace!(%tag, "skip subtree");
                Ok(None)
            }
            TransitionKind::KeepSubtree => {
                self.keep_depth = 1;
                trace!(%tag, "keep subtree");
                self.buffer.append_tag(tag, &[], &[]).map(Some)
            }
        }
    }

    /// Self-closing tag, as one combined transition: the automaton state
    /// and both depth counters are unchanged afterwards.
    pub fn on_bachelor(&mut self, tags: &mut TagTable, name: &str) -> Result<Option<NodeId>> {
        if self.skip_depth > 0 {
            return Ok(None);
        }
        let tag = tags.intern(name);
        if self.keep_depth > 0 {
            return self.append_closed(tag, None).map(Some);
        }

        let transition = self.automaton.transition(self.state, tag);
        match transition.kind {
            TransitionKind::Regular if self.automaton.keep_node(transition.target) => {
                self.append_closed(tag, Some(transition.target)).map(Some)
            }
            TransitionKind::Regular | TransitionKind::SkipSubtree => Ok(None),
            TransitionKind::KeepSubtree => self.append_closed(tag, None).map(Some),
        }
    }

    /// Close tag. Returns the closed node, if the open appended one.
    pub fn on_close(&mut self) -> Result<Option<NodeId>> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(None);
        }
        if self.keep_depth > 0 {
            self.keep_depth -= 1;
            return self.buffer.close_current().map(Some);
        }

        let Trace { state, appended } = self
            .trace
            .pop()
            .ok_or_else(|| Error::malformed("close tag without matching open tag"))?;
        self.state = state;
        if appended {
            self.buffer.close_current().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Character data. Text never changes the automaton state.
    pub fn on_text(&mut self, text: String) -> Result<Option<NodeId>> {
        if self.skip_depth > 0 {
            return Ok(None);
        }
        if self.keep_depth > 0 {
            return self.buffer.append_text(text, &[], &[]).map(Some);
        }
        match self.automaton.text_transition(self.state) {
            Some(target) => self
                .buffer
                .append_text(
                    text,
                    self.automaton.cumulative_roles(target),
                    self.automaton.non_cumulative_roles(target),
                )
                .map(Some),
            None => Ok(None),
        }
    }

    /// End of input: close the virtual root
    pub fn finish(&mut self) -> Result<NodeId> {
        if self.skip_depth > 0 || self.keep_depth > 0 || !self.trace.is_empty() {
            return Err(Error::malformed(format!(
                "premature end of input: {} element(s) still open",
                self.trace.len() + self.skip_depth + self.keep_depth
            )));
        }
        self.buffer.close_current()
    }

    fn append_tag_in(&mut self, state: StateId, tag: TagId) -> Result<NodeId> {
        self.buffer.append_tag(
            tag,
            self.automaton.cumulative_roles(state),
            self.automaton.non_cumulative_roles(state),
        )
    }

    fn append_closed(&mut self, tag: TagId, state: Option<StateId>) -> Result<NodeId> {
        let node = match state {
            Some(state) => self.append_tag_in(state, tag)?,
            None => self.buffer.append_tag(tag, &[], &[])?,
        };
        self.buffer.close_current()?;
        trace!(%tag, node = %node, "bachelor");
        Ok(node)
    }
}
