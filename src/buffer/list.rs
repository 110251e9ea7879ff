//! Intrusive sibling list
//!
//! A tag node's children, linked through each child's `right_sibling`.
//! The list itself only holds `front`/`back`, so it is `Copy`; every
//! mutation goes through the arena that stores the linked nodes.

use super::arena::Arena;
use super::node::{BufferNode, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeList {
    front: Option<NodeId>,
    back: Option<NodeId>,
    len: u32,
}

impl NodeList {
    pub const fn new() -> Self {
        NodeList {
            front: None,
            back: None,
            len: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.front.is_none()
    }

    #[inline]
    pub fn front(&self) -> Option<NodeId> {
        self.front
    }

    #[inline]
    pub fn back(&self) -> Option<NodeId> {
        self.back
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// O(1) append; the caller guarantees document order
    pub(crate) fn push_back(&mut self, arena: &mut Arena, id: NodeId) {
        match self.back.and_then(|back| arena.get_mut(back)) {
            Some(back) => back.right_sibling = Some(id),
            None => self.front = Some(id),
        }
        self.back = Some(id);
        self.len += 1;
    }

    /// Unlink `id` given its immediate left neighbour (`None` when `id` is
    /// the front) and destroy it with its subtree.
    /// Returns the number of nodes freed; 0 if the neighbour is wrong.
    pub(crate) fn remove_elem(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
        predecessor: Option<NodeId>,
    ) -> usize {
        let next = arena.get(id).and_then(BufferNode::right_sibling);
        match predecessor {
            None if self.front == Some(id) => self.front = next,
            Some(p) => match arena.get_mut(p) {
                Some(pred) if pred.right_sibling == Some(id) => pred.right_sibling = next,
                _ => return 0,
            },
            None => return 0,
        }
        if self.back == Some(id) {
            self.back = predecessor;
        }
        self.len -= 1;
        arena.free_subtree(id)
    }

    pub(crate) fn iter<'a>(&self, arena: &'a Arena) -> Siblings<'a> {
        Siblings {
            arena,
            next: self.front,
        }
    }
}

/// Left-to-right walk over a sibling chain
pub struct Siblings<'a> {
    arena: &'a Arena,
    next: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.get(current).and_then(BufferNode::right_sibling);
        Some(current)
    }
}
