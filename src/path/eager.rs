//! Eager Path Evaluation
//!
//! Step-by-step set evaluation over whatever is currently in the buffer:
//! each step maps the context set through its axis, node test and
//! predicate, then the union is sorted into document order with
//! duplicates removed. No tokens are pulled, so callers read the stream
//! to the end first when they need the complete answer.
//!
//! This is the reference the streaming iterator is checked against.

use std::collections::HashMap;

use rayon::prelude::*;

use super::step::{Axis, PathExpr, PathStep};
use crate::buffer::{Buffer, NodeId};

/// All nodes `path` selects from `base`, in document order
pub fn evaluate_eager(buffer: &Buffer, base: NodeId, path: &PathExpr) -> Vec<NodeId> {
    if !buffer.contains(base) {
        return Vec::new();
    }
    let order: HashMap<NodeId, usize> = buffer
        .descendants_or_self(base)
        .into_iter()
        .enumerate()
        .map(|(rank, id)| (id, rank))
        .collect();

    let mut context = vec![base];
    for step in path.steps() {
        let mut next = Vec::new();
        for &node in &context {
            apply_step(buffer, node, step, &mut next);
        }
        next.sort_unstable_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
        next.dedup();
        context = next;
        if context.is_empty() {
            break;
        }
    }
    context
}

/// Evaluate several paths against the same buffer on the rayon pool
pub fn evaluate_parallel(buffer: &Buffer, base: NodeId, paths: &[PathExpr]) -> Vec<Vec<NodeId>> {
    paths
        .par_iter()
        .map(|path| evaluate_eager(buffer, base, path))
        .collect()
}

fn apply_step(buffer: &Buffer, context: NodeId, step: &PathStep, out: &mut Vec<NodeId>) {
    let candidates: Vec<NodeId> = match step.axis {
        Axis::Child => buffer.children(context).collect(),
        Axis::Descendant => buffer
            .descendants_or_self(context)
            .into_iter()
            .skip(1)
            .collect(),
        Axis::DescendantOrSelf => buffer.descendants_or_self(context),
    };
    let mut matching = candidates.into_iter().filter(|&id| {
        buffer
            .node(id)
            .is_some_and(|node| step.test.matches(node))
    });
    match step.position {
        None => out.extend(matching),
        Some(k) => out.extend(k.checked_sub(1).and_then(|i| matching.nth(i as usize))),
    }
}
