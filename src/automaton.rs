//! Projection Automaton
//!
//! A DFA over tag ids that decides, for every incoming tag, whether the
//! node is buffered, whether its whole subtree is dropped unseen, or
//! whether its whole subtree is kept without further lookups. Each state
//! carries the roles attached to nodes appended in that state.
//!
//! The automaton is produced by static query analysis; the stream tracker
//! only consumes it through [`ProjectionAutomaton`]. [`Automaton`] is the
//! table-driven implementation, assembled with [`AutomatonBuilder`].

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::tags::{RoleId, TagId};

/// Index of an automaton state
pub type StateId = u32;

/// How a tag transition treats the subtree it opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Follow the edge; the target state's keep flag decides buffering
    Regular,
    /// Discard the whole subtree without looking at it
    SkipSubtree,
    /// Buffer the whole subtree verbatim, no roles, no further lookups
    KeepSubtree,
}

/// Outcome of one tag transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub target: StateId,
    pub kind: TransitionKind,
}

impl Transition {
    pub fn regular(target: StateId) -> Self {
        Transition {
            target,
            kind: TransitionKind::Regular,
        }
    }

    pub fn skip(target: StateId) -> Self {
        Transition {
            target,
            kind: TransitionKind::SkipSubtree,
        }
    }

    pub fn keep(target: StateId) -> Self {
        Transition {
            target,
            kind: TransitionKind::KeepSubtree,
        }
    }
}

/// Read-only view of a projection automaton
pub trait ProjectionAutomaton {
    fn initial_state(&self) -> StateId;

    /// Transition on an opening tag
    fn transition(&self, state: StateId, tag: TagId) -> Transition;

    /// Whether nodes reached in `state` are buffered
    fn keep_node(&self, state: StateId) -> bool;

    fn cumulative_roles(&self, state: StateId) -> &[RoleId];

    fn non_cumulative_roles(&self, state: StateId) -> &[RoleId];

    /// Destination for character data seen in `state`; `None` drops it
    fn text_transition(&self, state: StateId) -> Option<StateId>;
}

#[derive(Debug, Clone, Default)]
struct State {
    edges: HashMap<TagId, Transition>,
    wildcard: Option<Transition>,
    text: Option<StateId>,
    keep: bool,
    cumulative: SmallVec<[RoleId; 2]>,
    non_cumulative: SmallVec<[RoleId; 2]>,
}

/// Table-driven projection automaton
#[derive(Debug, Clone)]
pub struct Automaton {
    states: Vec<State>,
}

impl Automaton {
    /// State 0, the initial state
    pub const INITIAL: StateId = 0;

    /// Automaton that buffers the entire document without roles
    pub fn keep_everything() -> Self {
        let mut builder = AutomatonBuilder::new();
        builder
            .keep(Self::INITIAL)
            .wildcard(Self::INITIAL, Transition::keep(Self::INITIAL))
            .text(Self::INITIAL, Self::INITIAL);
        builder.build()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id as usize)
    }
}

impl ProjectionAutomaton for Automaton {
    fn initial_state(&self) -> StateId {
        Self::INITIAL
    }

    /// Tags with neither an edge nor a wildcard skip their subtree
    fn transition(&self, state: StateId, tag: TagId) -> Transition {
        self.state(state)
            .and_then(|s| s.edges.get(&tag).copied().or(s.wildcard))
            .unwrap_or(Transition::skip(state))
    }

    fn keep_node(&self, state: StateId) -> bool {
        self.state(state).is_some_and(|s| s.keep)
    }

    fn cumulative_roles(&self, state: StateId) -> &[RoleId] {
        self.state(state)
            .map(|s| s.cumulative.as_slice())
            .unwrap_or_default()
    }

    fn non_cumulative_roles(&self, state: StateId) -> &[RoleId] {
        self.state(state)
            .map(|s| s.non_cumulative.as_slice())
            .unwrap_or_default()
    }

    fn text_transition(&self, state: StateId) -> Option<StateId> {
        self.state(state).and_then(|s| s.text)
    }
}

/// Incremental construction of an [`Automaton`]
///
/// The builder starts with the initial state (id 0) already present.
#[derive(Debug, Clone)]
pub struct AutomatonBuilder {
    states: Vec<State>,
}

impl AutomatonBuilder {
    pub fn new() -> Self {
        AutomatonBuilder {
            states: vec![State::default()],
        }
    }

    /// Add a state that does not keep its nodes
    pub fn state(&mut self) -> StateId {
        self.states.push(State::default());
        (self.states.len() - 1) as StateId
    }

    /// Add a state whose nodes are buffered
    pub fn keep_state(&mut self) -> StateId {
        let id = self.state();
        self.keep(id);
        id
    }

    pub fn keep(&mut self, state: StateId) -> &mut Self {
        self.slot(state).keep = true;
        self
    }

    /// Roles attached to every node appended in `state`
    pub fn roles(
        &mut self,
        state: StateId,
        cumulative: &[RoleId],
        non_cumulative: &[RoleId],
    ) -> &mut Self {
        let slot = self.slot(state);
        slot.cumulative.extend_from_slice(cumulative);
        slot.non_cumulative.extend_from_slice(non_cumulative);
        self
    }

    pub fn edge(&mut self, from: StateId, tag: TagId, transition: Transition) -> &mut Self {
        self.slot(from).edges.insert(tag, transition);
        self
    }

    /// Transition for tags without an explicit edge
    pub fn wildcard(&mut self, from: StateId, transition: Transition) -> &mut Self {
        self.slot(from).wildcard = Some(transition);
        self
    }

    pub fn text(&mut self, from: StateId, to: StateId) -> &mut Self {
        self.slot(from).text = Some(to);
        self
    }

    pub fn build(self) -> Automaton {
        Automaton {
            states: self.states,
        }
    }

    /// States referenced before they are added are created on demand
    fn slot(&mut self, state: StateId) -> &mut State {
        let index = state as usize;
        if index >= self.states.len() {
            self.states.resize_with(index + 1, State::default);
        }
        &mut self.states[index]
    }
}

impl Default for AutomatonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_edge_skips_subtree() {
        let automaton = AutomatonBuilder::new().build();
        let t = automaton.transition(Automaton::INITIAL, TagId(5));
        assert_eq!(t.kind, TransitionKind::SkipSubtree);
        assert_eq!(t.target, Automaton::INITIAL);
        assert!(!automaton.keep_node(Automaton::INITIAL));
    }

    #[test]
    fn test_edges_win_over_wildcard() {
        let mut builder = AutomatonBuilder::new();
        let a = builder.keep_state();
        let other = builder.state();
        builder
            .edge(Automaton::INITIAL, TagId(1), Transition::regular(a))
            .wildcard(Automaton::INITIAL, Transition::regular(other))
            .roles(a, &[RoleId(0)], &[RoleId(1), RoleId(1)])
            .text(a, a);
        let automaton = builder.build();

        assert_eq!(automaton.transition(0, TagId(1)), Transition::regular(a));
        assert_eq!(automaton.transition(0, TagId(2)), Transition::regular(other));
        assert!(automaton.keep_node(a));
        assert!(!automaton.keep_node(other));
        assert_eq!(automaton.cumulative_roles(a), &[RoleId(0)]);
        assert_eq!(automaton.non_cumulative_roles(a), &[RoleId(1), RoleId(1)]);
        assert_eq!(automaton.text_transition(a), Some(a));
        assert_eq!(automaton.text_transition(other), None);
    }

    #[test]
    fn test_keep_everything() {
        let automaton = Automaton::keep_everything();
        assert_eq!(automaton.state_count(), 1);
        let t = automaton.transition(automaton.initial_state(), TagId(42));
        assert_eq!(t.kind, TransitionKind::KeepSubtree);
        assert_eq!(automaton.text_transition(0), Some(0));
    }

    #[test]
    fn test_unknown_state_is_inert() {
        let automaton = Automaton::keep_everything();
        assert!(!automaton.keep_node(9));
        assert!(automaton.cumulative_roles(9).is_empty());
        assert_eq!(automaton.transition(9, TagId(1)).kind, TransitionKind::SkipSubtree);
    }
}
