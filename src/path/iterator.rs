//! Buffer Iterator - streaming path matcher
//!
//! Walks the buffer in document order from a base node and yields the
//! nodes a path selects, pulling tokens through the [`DocumentStream`]
//! only when the walk reaches the edge of what is materialized.
//!
//! The walk keeps one frame per node on the path from the base to the
//! current node. A frame records which path positions hold at its node
//! (position `p` means steps `0..p` matched with this node as the last
//! one, position 0 is the base) and the union of those positions over
//! all ancestors. A node's positions follow from its parent's frame for
//! child steps and from any ancestor frame for descendant steps, so
//! every way of matching the path is tracked at once and no part of the
//! walk ever has to be repeated. Positional predicates count candidates
//! per context frame.
//!
//! With subtree skipping on, a subtree is only entered when some pending
//! step can still select a node inside it; a pure child chain therefore
//! moves from sibling to sibling at the depth it needs.

use std::fmt::Write as _;

use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use super::step::{Axis, PathExpr, PathStep};
use crate::buffer::{Buffer, NodeId};
use crate::error::{Error, Result};
use crate::stream::DocumentStream;

/// How much input to pull before a result is handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Only what matching needed
    #[default]
    Structural,
    /// Until the result node is closed, so its content is complete
    UpToResultClose,
    /// Until the base node is closed
    UpToBaseClose,
}

/// What happens to node locks as results are handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Never lock or unlock
    #[default]
    Untouched,
    /// Lock each result and unlock the previous one; collect only after
    /// the last result
    LockDeferredGc,
    /// Lock each result, unlock the previous one and collect right away
    LockEagerGc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorOptions {
    /// Enter a subtree only when a pending step can match inside it.
    /// Off gives the plain depth-first walk.
    pub skip_subtrees: bool,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        IteratorOptions {
            skip_subtrees: true,
        }
    }
}

impl IteratorOptions {
    pub fn with_skip_subtrees(mut self, skip: bool) -> Self {
        self.skip_subtrees = skip;
        self
    }
}

/// Small bit set of path positions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StepSet {
    words: SmallVec<[u64; 1]>,
}

impl StepSet {
    fn insert(&mut self, p: usize) {
        let word = p / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (p % 64);
    }

    fn contains(&self, p: usize) -> bool {
        self.words
            .get(p / 64)
            .is_some_and(|w| w & (1u64 << (p % 64)) != 0)
    }

    fn union(&self, other: &StepSet) -> StepSet {
        let (mut out, shorter) = if self.words.len() >= other.words.len() {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        for (w, s) in out.words.iter_mut().zip(&shorter.words) {
            *w |= s;
        }
        out
    }

    /// Members in increasing order
    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            (0..64)
                .filter(move |&b| w & (1u64 << b) != 0)
                .map(move |b| i * 64 + b)
        })
    }

    fn max(&self) -> Option<usize> {
        self.iter().last()
    }
}

/// One node on the path from the base to the walk position
#[derive(Debug, Clone)]
struct Frame {
    node: NodeId,
    is_tag: bool,
    /// Positions that hold at this node
    states: StepSet,
    /// Union of `states` over ancestors-or-self, down from the base
    reach: StepSet,
    /// Per step: candidates counted with this node as context
    counters: SmallVec<[u32; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Start,
    /// Try the first child of the top frame next
    Descend,
    /// The top frame's subtree is done; move to its right sibling
    Advance,
    Exhausted,
}

/// Lazy, resumable evaluation of one path from one base node
#[derive(Debug, Clone)]
pub struct BufferIterator {
    base: NodeId,
    path: PathExpr,
    options: IteratorOptions,
    can_skip_subtree: Vec<bool>,
    needs_backtrack: Vec<bool>,
    matched: Vec<Option<NodeId>>,
    match_count: Vec<u32>,
    frames: Vec<Frame>,
    cursor: Cursor,
    /// Last result this iterator locked and has not unlocked yet
    held: Option<NodeId>,
    returned: u64,
    /// Nodes below the base the walk has entered
    visited: u64,
}

impl BufferIterator {
    pub fn new(base: NodeId, path: PathExpr) -> Self {
        Self::with_options(base, path, IteratorOptions::default())
    }

    pub fn with_options(base: NodeId, path: PathExpr, options: IteratorOptions) -> Self {
        let n = path.len();
        let mut can_skip_subtree = Vec::with_capacity(n);
        let mut needs_backtrack = Vec::with_capacity(n);
        let mut after_descendant = false;
        for step in path.steps() {
            let child = step.axis == Axis::Child;
            can_skip_subtree.push(child && !after_descendant);
            needs_backtrack.push(child && after_descendant);
            after_descendant |= !child;
        }
        BufferIterator {
            base,
            path,
            options,
            can_skip_subtree,
            needs_backtrack,
            matched: vec![None; n],
            match_count: vec![0; n],
            frames: Vec::new(),
            cursor: Cursor::Start,
            held: None,
            returned: 0,
            visited: 0,
        }
    }

    pub fn base(&self) -> NodeId {
        self.base
    }

    pub fn path(&self) -> &PathExpr {
        &self.path
    }

    pub fn options(&self) -> IteratorOptions {
        self.options
    }

    /// Step `step` belongs to the leading run of child steps
    pub fn can_skip_subtree(&self, step: usize) -> bool {
        self.can_skip_subtree.get(step).copied().unwrap_or(false)
    }

    /// Step `step` is a child step behind a descendant step, so several
    /// ancestors may serve as its context at the same time
    pub fn needs_backtrack(&self, step: usize) -> bool {
        self.needs_backtrack.get(step).copied().unwrap_or(false)
    }

    /// Most recent node matched by `step`
    pub fn matched(&self, step: usize) -> Option<NodeId> {
        self.matched.get(step).copied().flatten()
    }

    pub fn match_count(&self, step: usize) -> u32 {
        self.match_count.get(step).copied().unwrap_or(0)
    }

    /// Deepest path position holding along the current walk path
    pub fn active_step(&self) -> usize {
        self.frames
            .last()
            .and_then(|f| f.reach.max())
            .unwrap_or(0)
    }

    /// The locked last result, if any
    pub fn held(&self) -> Option<NodeId> {
        self.held
    }

    /// Number of nodes below the base entered since construction or reset
    pub fn visited(&self) -> u64 {
        self.visited
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == Cursor::Exhausted
    }

    /// Next selected node in document order, or `None` once exhausted
    pub fn get_next<D: DocumentStream + ?Sized>(
        &mut self,
        stream: &mut D,
        read: ReadPolicy,
        lock: LockPolicy,
    ) -> Result<Option<NodeId>> {
        loop {
            match self.cursor {
                Cursor::Exhausted => return Ok(None),
                Cursor::Start => {
                    if let Some(found) = self.start(stream.buffer())? {
                        return self.deliver(stream, found, read, lock);
                    }
                }
                Cursor::Descend => {
                    let (node, descend) = {
                        let frame = self.top()?;
                        (frame.node, self.should_descend(frame))
                    };
                    if !stream.buffer().contains(node) {
                        return Err(self.internal("resume node was collected"));
                    }
                    self.cursor = Cursor::Advance;
                    if descend {
                        if let Some(child) = first_child(stream, node)? {
                            if self.enter(stream.buffer(), child)? {
                                return self.deliver(stream, child, read, lock);
                            }
                        }
                    }
                }
                Cursor::Advance => {
                    let Some(done) = self.frames.pop() else {
                        return Err(self.internal("walk stack underflow"));
                    };
                    let Some(parent) = self.frames.last().map(|f| f.node) else {
                        // back at the base
                        return self.exhaust(stream, read);
                    };
                    if let Some(sibling) = self.next_sibling(stream, done.node, parent)? {
                        if self.enter(stream.buffer(), sibling)? {
                            return self.deliver(stream, sibling, read, lock);
                        }
                    }
                }
            }
        }
    }

    /// Rewind to the freshly constructed state. The held result is
    /// unlocked without collecting, so the buffer is left as it was.
    pub fn reset(&mut self, buffer: &mut Buffer) {
        if let Some(held) = self.held.take() {
            buffer.unlock(held, false);
        }
        self.frames.clear();
        self.matched.fill(None);
        self.match_count.fill(0);
        self.cursor = Cursor::Start;
        self.returned = 0;
        self.visited = 0;
    }

    /// Reset and continue from a different base
    pub fn rebase(&mut self, buffer: &mut Buffer, base: NodeId) {
        self.reset(buffer);
        self.base = base;
    }

    /// Unlock the held result and collect from it, for callers that stop
    /// before the iterator is exhausted
    pub fn release(&mut self, buffer: &mut Buffer) {
        if let Some(held) = self.held.take() {
            buffer.unlock(held, true);
        }
    }

    /// Per-step and per-frame state, for diagnostics
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "path {} from {}", self.path, self.base);
        let _ = writeln!(
            out,
            "cursor {:?}, active step {}, results {}, visited {}, held {:?}",
            self.cursor,
            self.active_step(),
            self.returned,
            self.visited,
            self.held
        );
        for (j, step) in self.path.steps().iter().enumerate() {
            let _ = writeln!(
                out,
                "  step {j} {step}: skip_subtree={} backtrack={} matched={} count={}",
                self.can_skip_subtree[j],
                self.needs_backtrack[j],
                self.matched[j].map_or_else(|| "-".to_string(), |n| n.to_string()),
                self.match_count[j],
            );
        }
        for (depth, frame) in self.frames.iter().enumerate() {
            let _ = writeln!(
                out,
                "  frame {depth} {}: states {:?} reach {:?} counters {:?}",
                frame.node,
                frame.states.iter().collect::<Vec<_>>(),
                frame.reach.iter().collect::<Vec<_>>(),
                frame.counters.as_slice(),
            );
        }
        out
    }

    fn internal(&self, message: &str) -> Error {
        Error::internal(message, self.dump())
    }

    fn top(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| self.internal("walk stack is empty"))
    }

    /// Push the base frame. Returns the base if it is itself a result.
    fn start(&mut self, buffer: &Buffer) -> Result<Option<NodeId>> {
        let Some(node) = buffer.node(self.base) else {
            return Err(self.internal("base node is not in the buffer"));
        };
        let n = self.path.len();
        if self.path.is_unsatisfiable()
            || (node.is_text() && self.path.is_unsatisfiable_from_text())
        {
            debug!(path = %self.path, base = %self.base, "path cannot match from this base");
            self.cursor = Cursor::Exhausted;
            return Ok(None);
        }

        let mut states = StepSet::default();
        states.insert(0);
        let mut counters: SmallVec<[u32; 4]> = smallvec![0; n];
        for (j, step) in self.path.steps().iter().enumerate() {
            if step.axis == Axis::DescendantOrSelf
                && states.contains(j)
                && step.test.matches(node)
                && qualifies(step, &mut counters[j])
            {
                states.insert(j + 1);
                self.matched[j] = Some(self.base);
                self.match_count[j] += 1;
            }
        }

        let is_result = states.contains(n);
        self.frames.push(Frame {
            node: self.base,
            is_tag: node.is_tag(),
            reach: states.clone(),
            states,
            counters,
        });
        self.cursor = Cursor::Descend;
        Ok(is_result.then_some(self.base))
    }

    /// Push a frame for `id`, a child of the top frame's node. Returns
    /// whether `id` is a result.
    fn enter(&mut self, buffer: &Buffer, id: NodeId) -> Result<bool> {
        let Some(node) = buffer.node(id) else {
            return Err(self.internal("visited node is not in the buffer"));
        };
        let n = self.path.len();
        let mut states = StepSet::default();
        let mut counters: SmallVec<[u32; 4]> = smallvec![0; n];

        if self.frames.is_empty() {
            return Err(self.internal("no parent frame"));
        }

        let reach = {
            let last = self.frames.len() - 1;
            let (ancestors, rest) = self.frames.split_at_mut(last);
            let parent = &mut rest[0];
            for (j, step) in self.path.steps().iter().enumerate() {
                if !step.test.matches(node) {
                    continue;
                }
                let hit = match step.axis {
                    Axis::Child => {
                        parent.states.contains(j) && qualifies(step, &mut parent.counters[j])
                    }
                    Axis::Descendant | Axis::DescendantOrSelf => {
                        let mut hit = false;
                        if step.axis == Axis::DescendantOrSelf && states.contains(j) {
                            hit |= qualifies(step, &mut counters[j]);
                        }
                        if step.position.is_none() {
                            hit || parent.reach.contains(j)
                        } else {
                            for frame in ancestors.iter_mut().chain(std::iter::once(&mut *parent)) {
                                if frame.states.contains(j) {
                                    hit |= qualifies(step, &mut frame.counters[j]);
                                }
                            }
                            hit
                        }
                    }
                };
                if hit {
                    states.insert(j + 1);
                    self.matched[j] = Some(id);
                    self.match_count[j] += 1;
                }
            }
            parent.reach.union(&states)
        };

        self.visited += 1;
        let is_result = states.contains(n);
        trace!(node = %id, states = ?states.iter().collect::<SmallVec<[usize; 4]>>(), "visit");
        self.frames.push(Frame {
            node: id,
            is_tag: node.is_tag(),
            states,
            reach,
            counters,
        });
        self.cursor = Cursor::Descend;
        Ok(is_result)
    }

    /// Whether some pending step can select a node below `frame`
    fn should_descend(&self, frame: &Frame) -> bool {
        if !frame.is_tag {
            return false;
        }
        let steps = self.path.steps();
        frame
            .reach
            .iter()
            .take_while(|&p| p < steps.len())
            .any(|p| {
                !self.options.skip_subtrees
                    || match steps[p].axis {
                        Axis::Child => frame.states.contains(p),
                        Axis::Descendant | Axis::DescendantOrSelf => true,
                    }
            })
    }

    /// Right sibling of `node`, pulling input until it exists or the
    /// parent closes
    fn next_sibling<D: DocumentStream + ?Sized>(
        &self,
        stream: &mut D,
        node: NodeId,
        parent: NodeId,
    ) -> Result<Option<NodeId>> {
        loop {
            let buffer = stream.buffer();
            if !buffer.contains(node) {
                return Err(self.internal("walk position was collected"));
            }
            if let Some(sibling) = buffer.right_sibling(node) {
                return Ok(Some(sibling));
            }
            if buffer.is_closed(parent) || !stream.read_next()? {
                return Ok(None);
            }
        }
    }

    fn deliver<D: DocumentStream + ?Sized>(
        &mut self,
        stream: &mut D,
        node: NodeId,
        read: ReadPolicy,
        lock: LockPolicy,
    ) -> Result<Option<NodeId>> {
        match read {
            ReadPolicy::Structural => {}
            ReadPolicy::UpToResultClose => read_until_closed(stream, node)?,
            ReadPolicy::UpToBaseClose => read_until_closed(stream, self.base)?,
        }
        if lock != LockPolicy::Untouched {
            // lock the new result before the old one can cascade
            let buffer = stream.buffer_mut();
            buffer.lock(node);
            if let Some(old) = self.held.replace(node) {
                buffer.unlock(old, lock == LockPolicy::LockEagerGc);
            }
        }
        self.returned += 1;
        trace!(node = %node, path = %self.path, "path result");
        Ok(Some(node))
    }

    fn exhaust<D: DocumentStream + ?Sized>(
        &mut self,
        stream: &mut D,
        read: ReadPolicy,
    ) -> Result<Option<NodeId>> {
        self.cursor = Cursor::Exhausted;
        self.frames.clear();
        if read == ReadPolicy::UpToBaseClose {
            read_until_closed(stream, self.base)?;
        }
        if let Some(held) = self.held.take() {
            stream.buffer_mut().unlock(held, true);
        }
        debug!(path = %self.path, results = self.returned, "path exhausted");
        Ok(None)
    }
}

/// Count a candidate against a positional predicate
fn qualifies(step: &PathStep, counter: &mut u32) -> bool {
    match step.position {
        None => true,
        Some(k) => {
            // past `k` the predicate fails either way
            *counter = counter.saturating_add(1);
            *counter == k
        }
    }
}

/// First child of `node`, pulling input until one exists or it closes
fn first_child<D: DocumentStream + ?Sized>(stream: &mut D, node: NodeId) -> Result<Option<NodeId>> {
    loop {
        let buffer = stream.buffer();
        if let Some(child) = buffer.first_child(node) {
            return Ok(Some(child));
        }
        if buffer.is_closed(node) || !stream.read_next()? {
            return Ok(None);
        }
    }
}

fn read_until_closed<D: DocumentStream + ?Sized>(stream: &mut D, node: NodeId) -> Result<()> {
    while !stream.buffer().is_closed(node) {
        if !stream.read_next()? {
            break;
        }
    }
    Ok(())
}
