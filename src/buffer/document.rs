//! Streaming Buffer - the partially materialized document
//!
//! Owns the virtual root and the insertion cursor of the streaming tree
//! build, and runs the incremental garbage collection that removes nodes
//! as soon as no query operation can reach them again.
//!
//! Collection is lazy: it runs only when a role is signed off or a lock
//! is released, starting at the node concerned and cascading upwards.

use tracing::{debug, trace, warn};

use super::arena::Arena;
use super::list::{NodeList, Siblings};
use super::node::{BufferNode, NodeId};
use crate::error::{Error, Result};
use crate::tags::{RoleId, TagId};

/// Footprint and collection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Nodes currently in the buffer, root included
    pub live: usize,
    /// Highest value `live` has reached
    pub peak: usize,
    /// Nodes ever appended, root excluded
    pub appended: u64,
    /// Nodes removed by garbage collection
    pub collected: u64,
}

/// The shared, mutable working set of one query run
#[derive(Debug)]
pub struct Buffer {
    arena: Arena,
    root: NodeId,
    /// Most recently opened, not yet closed tag node
    cur: NodeId,
    stats: BufferStats,
}

impl Buffer {
    /// Create a buffer whose root carries the given roles
    pub fn new(cumulative: &[RoleId], non_cumulative: &[RoleId]) -> Self {
        let mut arena = Arena::new();
        let mut root = BufferNode::tag(TagId::ROOT, None);
        root.append_roles(cumulative, non_cumulative);
        let root = arena.alloc(root);
        Buffer {
            arena,
            root,
            cur: root,
            stats: BufferStats {
                live: 1,
                peak: 1,
                ..BufferStats::default()
            },
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The insertion cursor
    #[inline]
    pub fn current(&self) -> NodeId {
        self.cur
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&BufferNode> {
        self.arena.get(id)
    }

    /// `false` once the node has been collected
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Tree build
    // ------------------------------------------------------------------

    /// Append a tag node below the cursor and descend into it
    pub fn append_tag(
        &mut self,
        tag: TagId,
        cumulative: &[RoleId],
        non_cumulative: &[RoleId],
    ) -> Result<NodeId> {
        let mut node = BufferNode::tag(tag, Some(self.cur));
        node.append_roles(cumulative, non_cumulative);
        let id = self.append(node)?;
        self.cur = id;
        Ok(id)
    }

    /// Append a text node below the cursor; the cursor does not move
    pub fn append_text(
        &mut self,
        text: impl Into<String>,
        cumulative: &[RoleId],
        non_cumulative: &[RoleId],
    ) -> Result<NodeId> {
        let mut node = BufferNode::text(text.into(), Some(self.cur));
        node.append_roles(cumulative, non_cumulative);
        self.append(node)
    }

    fn append(&mut self, node: BufferNode) -> Result<NodeId> {
        let parent = self.cur;
        let mut children = match self.arena.get(parent) {
            Some(p) if !p.is_closed() => p.children().unwrap_or_default(),
            _ => return Err(Error::malformed("content after the end of the document")),
        };
        let id = self.arena.alloc(node);
        children.push_back(&mut self.arena, id);
        self.set_children(parent, children);

        self.stats.appended += 1;
        self.stats.live = self.arena.live();
        self.stats.peak = self.stats.peak.max(self.stats.live);
        trace!(node = %id, parent = %parent, "appended node");
        Ok(id)
    }

    /// Mark the cursor closed and move it up to its parent
    pub fn close_current(&mut self) -> Result<NodeId> {
        let closed = self.cur;
        let node = self
            .arena
            .get_mut(closed)
            .filter(|n| !n.is_closed())
            .ok_or_else(|| Error::malformed("close tag without matching open tag"))?;
        node.close();
        if let Some(parent) = node.parent() {
            self.cur = parent;
        }
        Ok(closed)
    }

    /// Add roles to an existing node
    pub fn append_roles(&mut self, id: NodeId, cumulative: &[RoleId], non_cumulative: &[RoleId]) {
        if let Some(node) = self.arena.get_mut(id) {
            node.append_roles(cumulative, non_cumulative);
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(BufferNode::parent)
    }

    #[inline]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(BufferNode::first_child)
    }

    #[inline]
    pub fn right_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(BufferNode::right_sibling)
    }

    #[inline]
    pub fn tag(&self, id: NodeId) -> Option<TagId> {
        self.node(id).and_then(BufferNode::tag_id)
    }

    /// Collected nodes report closed
    #[inline]
    pub fn is_closed(&self, id: NodeId) -> bool {
        self.node(id).is_none_or(BufferNode::is_closed)
    }

    #[inline]
    pub fn is_locked(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(BufferNode::is_locked)
    }

    /// Children currently in the buffer, left to right
    pub fn children(&self, id: NodeId) -> Siblings<'_> {
        let list = self
            .node(id)
            .and_then(BufferNode::children)
            .unwrap_or_default();
        list.iter(&self.arena)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id)
            .and_then(BufferNode::children)
            .map_or(0, |c| c.len())
    }

    /// Concatenation of all descendant text, in document order.
    ///
    /// Only exact once the subtree has been read up to its close.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            if let Some(text) = node.text_value() {
                out.push_str(text);
                continue;
            }
            let first = stack.len();
            stack.extend(self.children(current));
            stack[first..].reverse();
        }
        out
    }

    /// Every live node below `id` (self included) in document order
    pub fn descendants_or_self(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            let first = stack.len();
            stack.extend(self.children(current));
            stack[first..].reverse();
        }
        out
    }

    // ------------------------------------------------------------------
    // Locking and role sign-off
    // ------------------------------------------------------------------

    /// Pin a node against collection. Returns `false` if it is gone.
    pub fn lock(&mut self, id: NodeId) -> bool {
        match self.arena.get_mut(id) {
            Some(node) => {
                node.lock();
                true
            }
            None => false,
        }
    }

    /// Release one lock; with `collect`, run garbage collection from the
    /// node once it is no longer locked.
    pub fn unlock(&mut self, id: NodeId, collect: bool) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        if !node.unlock() {
            warn!(node = %id, "unlock of a node that is not locked");
            return;
        }
        if collect && !node.is_locked() {
            self.collect(id);
        }
    }

    /// Sign off `role` on `id` and collect whatever became unreachable.
    /// Returns `false` if the node is gone or did not carry the role.
    pub fn remove_role(&mut self, id: NodeId, role: RoleId) -> bool {
        let Some(node) = self.arena.get_mut(id) else {
            warn!(node = %id, %role, "role sign-off on a collected node");
            return false;
        };
        if !node.remove_role(role) {
            warn!(node = %id, %role, "role sign-off for a role the node does not carry");
            return false;
        }
        self.collect(id);
        true
    }

    // ------------------------------------------------------------------
    // Garbage collection
    // ------------------------------------------------------------------

    /// Run collection starting at `start`, cascading to ancestors.
    /// Returns the number of nodes freed.
    pub fn collect(&mut self, start: NodeId) -> usize {
        let mut freed = 0;
        let mut next = Some(start);

        while let Some(id) = next.take() {
            let Some(node) = self.arena.get(id) else {
                break;
            };
            if node.is_tag()
                && !node.is_cumulative_marked()
                && !self.has_cumulative_marked_ancestor(id)
            {
                freed += self.collect_children(id);
            }

            let Some(node) = self.arena.get(id) else {
                break;
            };
            if node.is_locked() {
                break;
            }
            if node.is_text() || (node.is_closed() && !node.has_children() && !node.is_root()) {
                next = node.parent();
            }
        }

        if freed > 0 {
            self.stats.collected += freed as u64;
            self.stats.live = self.arena.live();
            debug!(start = %start, freed, live = self.stats.live, "collected buffer nodes");
        }
        freed
    }

    /// Remove the leading run of removable children of `parent`.
    /// Stops at the first child that must stay, so no gap opens up in
    /// front of a live node.
    fn collect_children(&mut self, parent: NodeId) -> usize {
        let Some(mut children) = self.arena.get(parent).and_then(BufferNode::children) else {
            return 0;
        };
        let mut freed = 0;
        while let Some(front) = children.front() {
            if !self.is_subtree_free(front) {
                break;
            }
            let removed = children.remove_elem(&mut self.arena, front, None);
            if removed == 0 {
                break;
            }
            freed += removed;
        }
        self.set_children(parent, children);
        freed
    }

    /// No node in the subtree is marked, locked, or still open
    pub fn is_subtree_free(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.get(current) else {
                continue;
            };
            if node.is_marked() || node.is_locked() || !node.is_closed() {
                return false;
            }
            stack.extend(self.children(current));
        }
        true
    }

    pub fn has_cumulative_marked_ancestor(&self, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            let Some(node) = self.arena.get(p) else {
                return false;
            };
            if node.is_cumulative_marked() {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn set_children(&mut self, id: NodeId, list: NodeList) {
        if let Some(node) = self.arena.get_mut(id) {
            node.set_children(list);
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new(&[], &[])
    }
}
