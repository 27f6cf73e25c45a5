//! Collapsed groups waiting to be either evicted or restored.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use budgetree_core::{NodeHandle, NodeId};

/// Individual entries of one directory that were replaced by an aggregate.
///
/// The nodes stay in the arena, detached from the tree, until the group is
/// evicted (nodes released) or restored (nodes spliced back under `parent`).
#[derive(Debug)]
pub struct SmallGroup {
    parent: NodeHandle,
    children: Vec<NodeId>,
    cost: usize,
    blocks: u64,
    density: f64,
}

impl SmallGroup {
    /// Create a group. Its density is fixed here and never recomputed.
    pub fn new(parent: NodeHandle, children: Vec<NodeId>, cost: usize, blocks: u64) -> Self {
        Self {
            parent,
            children,
            cost,
            blocks,
            density: blocks as f64 / cost.max(1) as f64,
        }
    }

    pub fn parent(&self) -> NodeHandle {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn into_children(self) -> Vec<NodeId> {
        self.children
    }

    /// Heap bytes charged for keeping the detached nodes.
    pub fn cost(&self) -> usize {
        self.cost
    }

    /// Blocks represented by the group.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Blocks represented per byte of tracked metadata.
    pub fn density(&self) -> f64 {
        self.density
    }
}

struct Queued {
    seq: u64,
    group: SmallGroup,
}

impl Ord for Queued {
    // Reversed so the max-heap pops the lowest density, oldest first on ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .group
            .density
            .total_cmp(&self.group.density)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

/// Priority queue of [`SmallGroup`]s ordered by ascending density.
#[derive(Default)]
pub struct SmallGroupQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    tracked_cost: usize,
}

impl SmallGroupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: SmallGroup) {
        self.tracked_cost += group.cost;
        self.heap.push(Queued {
            seq: self.next_seq,
            group,
        });
        self.next_seq += 1;
    }

    /// The group that is cheapest to lose.
    pub fn peek_min(&self) -> Option<&SmallGroup> {
        self.heap.peek().map(|queued| &queued.group)
    }

    pub fn pop_min(&mut self) -> Option<SmallGroup> {
        let group = self.heap.pop()?.group;
        self.tracked_cost -= group.cost;
        Some(group)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Sum of the costs of all queued groups.
    pub fn tracked_cost(&self) -> usize {
        self.tracked_cost
    }

    /// Remove every group, lowest density first.
    pub fn drain(&mut self) -> Vec<SmallGroup> {
        self.tracked_cost = 0;
        let mut sorted = std::mem::take(&mut self.heap).into_sorted_vec();
        sorted.reverse();
        sorted.into_iter().map(|queued| queued.group).collect()
    }
}

impl std::fmt::Debug for SmallGroupQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmallGroupQueue")
            .field("len", &self.heap.len())
            .field("tracked_cost", &self.tracked_cost)
            .finish()
    }
}
