//! Slot arena for buffer nodes
//!
//! Freed slots go on a free list and are reused; each reuse bumps the slot
//! generation so outstanding `NodeId`s of the old occupant stop resolving.

use super::node::{BufferNode, NodeId};

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<BufferNode>,
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Arena {
            slots: Vec::with_capacity(256),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn alloc(&mut self, node: BufferNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::new(index, 0)
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<&BufferNode> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut BufferNode> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    /// Free one slot, returning its node
    fn release(&mut self, id: NodeId) -> Option<BufferNode> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;
        Some(node)
    }

    /// Free `id` and everything below it. Returns the number of nodes freed.
    pub(crate) fn free_subtree(&mut self, id: NodeId) -> usize {
        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.release(current) else {
                continue;
            };
            freed += 1;
            let mut child = node.first_child();
            while let Some(c) = child {
                child = self.get(c).and_then(BufferNode::right_sibling);
                stack.push(c);
            }
        }
        freed
    }

    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }
}
