//! Buffer Node representation
//!
//! A node of the partially materialized document. Ownership is strictly a
//! tree: a tag node owns its children through its `NodeList`; `parent` and
//! `right_sibling` are plain handles that never own.

use std::fmt;

use smallvec::SmallVec;

use super::list::NodeList;
use crate::tags::{RoleId, TagId};

/// Generational handle of a buffer node.
///
/// A collected node's slot is reused with a bumped generation, so a stale
/// handle resolves to nothing instead of to the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        NodeId { index, generation }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Type of buffer node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Tag,
    Text,
}

#[derive(Debug)]
pub(crate) enum Payload {
    Tag {
        tag: TagId,
        closed: bool,
        children: NodeList,
    },
    Text(String),
}

/// Role multisets attached to a node
#[derive(Debug, Default, Clone)]
pub struct Roles {
    /// Also freeze the whole subtree against collection
    cumulative: SmallVec<[RoleId; 2]>,
    /// Apply to this node only
    non_cumulative: SmallVec<[RoleId; 2]>,
}

impl Roles {
    #[inline]
    pub fn cumulative(&self) -> &[RoleId] {
        &self.cumulative
    }

    #[inline]
    pub fn non_cumulative(&self) -> &[RoleId] {
        &self.non_cumulative
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty() && self.non_cumulative.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cumulative.len() + self.non_cumulative.len()
    }

    fn extend(&mut self, cumulative: &[RoleId], non_cumulative: &[RoleId]) {
        self.cumulative.extend_from_slice(cumulative);
        self.non_cumulative.extend_from_slice(non_cumulative);
    }

    /// Remove one occurrence of `role`, cumulative set first
    fn remove(&mut self, role: RoleId) -> bool {
        if let Some(i) = self.cumulative.iter().position(|&r| r == role) {
            self.cumulative.remove(i);
            return true;
        }
        if let Some(i) = self.non_cumulative.iter().position(|&r| r == role) {
            self.non_cumulative.remove(i);
            return true;
        }
        false
    }
}

/// A node in the buffer arena
#[derive(Debug)]
pub struct BufferNode {
    pub(crate) payload: Payload,
    pub(crate) parent: Option<NodeId>,
    pub(crate) right_sibling: Option<NodeId>,
    locks: u32,
    roles: Roles,
}

impl BufferNode {
    pub(crate) fn tag(tag: TagId, parent: Option<NodeId>) -> Self {
        BufferNode {
            payload: Payload::Tag {
                tag,
                closed: false,
                children: NodeList::new(),
            },
            parent,
            right_sibling: None,
            locks: 0,
            roles: Roles::default(),
        }
    }

    pub(crate) fn text(text: String, parent: Option<NodeId>) -> Self {
        BufferNode {
            payload: Payload::Text(text),
            parent,
            right_sibling: None,
            locks: 0,
            roles: Roles::default(),
        }
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Tag { .. } => NodeKind::Tag,
            Payload::Text(_) => NodeKind::Text,
        }
    }

    #[inline]
    pub fn is_tag(&self) -> bool {
        self.kind() == NodeKind::Tag
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind() == NodeKind::Text
    }

    /// Tag id for tag nodes
    #[inline]
    pub fn tag_id(&self) -> Option<TagId> {
        match self.payload {
            Payload::Tag { tag, .. } => Some(tag),
            Payload::Text(_) => None,
        }
    }

    /// Own content of a text node
    #[inline]
    pub fn text_value(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(t),
            Payload::Tag { .. } => None,
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.tag_id().is_some_and(TagId::is_root)
    }

    /// Text nodes count as closed
    #[inline]
    pub fn is_closed(&self) -> bool {
        match self.payload {
            Payload::Tag { closed, .. } => closed,
            Payload::Text(_) => true,
        }
    }

    pub(crate) fn close(&mut self) {
        if let Payload::Tag { closed, .. } = &mut self.payload {
            *closed = true;
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn right_sibling(&self) -> Option<NodeId> {
        self.right_sibling
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.children().and_then(|c| c.front())
    }

    #[inline]
    pub(crate) fn children(&self) -> Option<NodeList> {
        match self.payload {
            Payload::Tag { children, .. } => Some(children),
            Payload::Text(_) => None,
        }
    }

    pub(crate) fn set_children(&mut self, list: NodeList) {
        if let Payload::Tag { children, .. } = &mut self.payload {
            *children = list;
        }
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child().is_some()
    }

    #[inline]
    pub fn lock_count(&self) -> u32 {
        self.locks
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locks > 0
    }

    pub(crate) fn lock(&mut self) {
        self.locks += 1;
    }

    /// Returns `false` when the node was not locked
    pub(crate) fn unlock(&mut self) -> bool {
        if self.locks == 0 {
            return false;
        }
        self.locks -= 1;
        true
    }

    #[inline]
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    /// Either role multiset is non-empty
    #[inline]
    pub fn is_marked(&self) -> bool {
        !self.roles.is_empty()
    }

    #[inline]
    pub fn is_cumulative_marked(&self) -> bool {
        !self.roles.cumulative.is_empty()
    }

    pub(crate) fn append_roles(&mut self, cumulative: &[RoleId], non_cumulative: &[RoleId]) {
        self.roles.extend(cumulative, non_cumulative);
    }

    pub(crate) fn remove_role(&mut self, role: RoleId) -> bool {
        self.roles.remove(role)
    }
}
