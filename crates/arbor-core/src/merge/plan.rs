//! Planning: from three trees and their matchings to an operation sequence.
//!
//! The planner works on *tasks*. A task is one parent position in the merged
//! tree together with the three child sequences to merge into it. The first
//! task is the virtual parent above the three roots; every `Merge` outcome
//! spawns a task for that node's children. Tasks are processed from an
//! explicit stack, so deep trees cannot overflow the call stack.

use std::collections::{HashMap, HashSet};
use std::thread;

use tracing::{debug, trace};

use crate::matching::Matchings;
use crate::tree::{ArtifactTree, NodeId, NodeRef, Revision, has_changes};

use super::conflict::{ConflictDraft, ConflictKind};
use super::operation::{Operation, TargetPath};
use super::{MergeConfig, MergeMatchings, MergeTrees, join};

pub(crate) struct Planner<'a> {
    trees: MergeTrees<'a>,
    matchings: MergeMatchings<'a>,
    config: &'a MergeConfig,
}

/// Children of one merged node, still to be laid out.
struct Task {
    target: TargetPath,
    layout: Layout,
}

/// Child sequences split into anchors and the gaps between them.
struct Layout {
    /// Child order is insignificant.
    unordered: bool,
    /// Base children deleted on both sides.
    deleted: Vec<NodeId>,
    slots: Vec<Slot>,
    /// Both sides reordered the anchors, differently.
    order_conflict: bool,
}

enum Slot {
    Anchor(Anchor),
    Gap(Gap),
}

/// A base child kept in both sides' sequences.
#[derive(Clone, Copy)]
struct Anchor {
    base: NodeId,
    left: NodeId,
    right: NodeId,
}

/// Everything one position range holds on each side besides anchors.
#[derive(Default)]
struct Gap {
    left: Vec<GapItem>,
    right: Vec<GapItem>,
}

#[derive(Clone, Copy)]
enum GapItem {
    /// A base child this side kept and the other side deleted.
    Survivor { base: NodeId, node: NodeId },
    /// A node with no base counterpart in this sequence.
    Inserted(NodeId),
}

/// Which side a sequence walk is on.
#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl<'a> Planner<'a> {
    pub(crate) const fn new(
        trees: MergeTrees<'a>,
        matchings: MergeMatchings<'a>,
        config: &'a MergeConfig,
    ) -> Self {
        Self {
            trees,
            matchings,
            config,
        }
    }

    /// The full operation sequence.
    ///
    /// Planning descends sequentially while there is a single task. Once the
    /// frontier branches, contiguous chunks of it go to worker threads and the
    /// per-chunk sequences are concatenated in order, which gives exactly the
    /// sequential result.
    pub(crate) fn plan(&self) -> Vec<Operation> {
        let roots = |tree: &ArtifactTree| {
            if tree.is_empty_artifact() {
                Vec::new()
            } else {
                vec![tree.root()]
            }
        };
        let layout = self.layout(
            false,
            &roots(self.trees.base),
            &roots(self.trees.left),
            &roots(self.trees.right),
        );

        let mut operations = Vec::new();
        let mut frontier = vec![Task {
            target: TargetPath::root(),
            layout,
        }];
        while frontier.len() == 1 {
            let Some(task) = frontier.pop() else {
                break;
            };
            frontier = self.process(task, &mut operations);
        }

        let workers = thread::available_parallelism().map_or(1, usize::from);
        if !self.config.parallel || frontier.len() < 2 || workers < 2 {
            self.drain(frontier, &mut operations);
            return operations;
        }

        let chunk = frontier.len().div_ceil(workers.min(frontier.len()));
        let mut chunks = Vec::new();
        let mut rest = frontier;
        while !rest.is_empty() {
            let tail = rest.split_off(chunk.min(rest.len()));
            chunks.push(rest);
            rest = tail;
        }
        debug!(
            tasks = chunks.iter().map(Vec::len).sum::<usize>(),
            workers = chunks.len(),
            "planning in parallel"
        );

        let parts: Vec<Vec<Operation>> = thread::scope(|scope| {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|tasks| {
                    scope.spawn(move || {
                        let mut ops = Vec::new();
                        self.drain(tasks, &mut ops);
                        ops
                    })
                })
                .collect();
            handles.into_iter().map(join).collect()
        });
        operations.extend(parts.into_iter().flatten());
        operations
    }

    /// Process `tasks` and all their descendants depth-first, in order.
    fn drain(&self, tasks: Vec<Task>, operations: &mut Vec<Operation>) {
        let mut stack: Vec<Task> = tasks.into_iter().rev().collect();
        while let Some(task) = stack.pop() {
            let children = self.process(task, operations);
            stack.extend(children.into_iter().rev());
        }
    }

    /// Emit the operations for one task; return the tasks it spawns.
    fn process(&self, task: Task, operations: &mut Vec<Operation>) -> Vec<Task> {
        let Task { target, layout } = task;
        let mut out = Emitter {
            parent: target,
            next: 0,
            unordered: layout.unordered,
            operations,
        };
        let mut spawned = Vec::new();

        for base in layout.deleted {
            out.delete(base);
        }
        for slot in layout.slots {
            match slot {
                Slot::Anchor(anchor) => {
                    if let Some(task) = self.place_anchor(anchor, &mut out) {
                        spawned.push(task);
                    }
                }
                Slot::Gap(gap) => self.place_gap(gap, &mut out),
            }
        }
        spawned
    }

    // -- layout -------------------------------------------------------------

    /// Split the three child sequences into anchors, gaps and double
    /// deletions.
    fn layout(
        &self,
        unordered: bool,
        base: &[NodeId],
        left: &[NodeId],
        right: &[NodeId],
    ) -> Layout {
        let base_left = self.matchings.base_left;
        let base_right = self.matchings.base_right;
        let left_set: HashSet<NodeId> = left.iter().copied().collect();
        let right_set: HashSet<NodeId> = right.iter().copied().collect();
        let base_set: HashSet<NodeId> = base.iter().copied().collect();

        let in_left = |b: NodeId| {
            base_left
                .forward(b)
                .is_some_and(|m| left_set.contains(&m.partner))
        };
        let in_right = |b: NodeId| {
            base_right
                .forward(b)
                .is_some_and(|m| right_set.contains(&m.partner))
        };

        let deleted = base
            .iter()
            .copied()
            .filter(|b| !in_left(*b) && !in_right(*b))
            .collect();
        let anchors: HashSet<NodeId> = base
            .iter()
            .copied()
            .filter(|b| in_left(*b) && in_right(*b))
            .collect();
        let base_order: Vec<NodeId> = base
            .iter()
            .copied()
            .filter(|b| anchors.contains(b))
            .collect();

        let walk = |sequence: &[NodeId], matchings: &Matchings| {
            let mut order = Vec::new();
            let mut items: Vec<(Option<NodeId>, GapItem)> = Vec::new();
            let mut key = None;
            for &node in sequence {
                match matchings
                    .backward(node)
                    .map(|m| m.partner)
                    .filter(|b| base_set.contains(b))
                {
                    Some(b) if anchors.contains(&b) => {
                        order.push(b);
                        key = Some(b);
                    }
                    Some(b) => items.push((key, GapItem::Survivor { base: b, node })),
                    None => items.push((key, GapItem::Inserted(node))),
                }
            }
            (order, items)
        };
        let (left_order, left_items) = walk(left, base_left);
        let (right_order, right_items) = walk(right, base_right);

        let (order, order_conflict) = if unordered || right_order == base_order {
            (left_order, false)
        } else if left_order == base_order || left_order == right_order {
            (right_order, false)
        } else {
            (left_order, true)
        };

        let anchor = |b: NodeId| {
            let left = base_left.forward(b).map(|m| m.partner);
            let right = base_right.forward(b).map(|m| m.partner);
            left.zip(right).map(|(left, right)| Anchor {
                base: b,
                left,
                right,
            })
        };

        let mut slots = Vec::with_capacity(order.len() * 2 + 1);
        if unordered {
            slots.extend(order.into_iter().filter_map(anchor).map(Slot::Anchor));
            slots.push(Slot::Gap(Gap {
                left: left_items.into_iter().map(|(_, item)| item).collect(),
                right: right_items.into_iter().map(|(_, item)| item).collect(),
            }));
        } else {
            let mut gaps: HashMap<Option<NodeId>, Gap> = HashMap::new();
            for (key, item) in left_items {
                gaps.entry(key).or_default().left.push(item);
            }
            for (key, item) in right_items {
                gaps.entry(key).or_default().right.push(item);
            }
            slots.push(Slot::Gap(gaps.remove(&None).unwrap_or_default()));
            for b in order {
                if let Some(anchor) = anchor(b) {
                    slots.push(Slot::Anchor(anchor));
                }
                slots.push(Slot::Gap(gaps.remove(&Some(b)).unwrap_or_default()));
            }
        }

        Layout {
            unordered,
            deleted,
            slots,
            order_conflict,
        }
    }

    // -- anchors ------------------------------------------------------------

    /// The decision table for a triple present on all three sides.
    fn place_anchor(&self, anchor: Anchor, out: &mut Emitter<'_>) -> Option<Task> {
        let Anchor { base, left, right } = anchor;
        let left_changed = self.changed(Side::Left, base);
        let right_changed = self.changed(Side::Right, base);

        match (left_changed, right_changed) {
            (false, false) => out.keep(NodeRef::new(Revision::Base, base)),
            (true, false) => out.keep(NodeRef::new(Revision::Left, left)),
            (false, true) => out.keep(NodeRef::new(Revision::Right, right)),
            (true, true) => {
                if self.trees.left.fingerprint(left) == self.trees.right.fingerprint(right) {
                    trace!(%base, "convergent change");
                    out.keep(NodeRef::new(Revision::Left, left));
                    return None;
                }
                match self.mergeable(anchor) {
                    Some((label, value, layout)) => {
                        let kind = self.trees.base[base].kind().to_owned();
                        let target = out.merge(anchor, kind, label, value);
                        return Some(Task { target, layout });
                    }
                    None => out.conflict(ConflictKind::Content, Some(base), Some(left), Some(right)),
                }
            }
        }
        None
    }

    /// Can a triple changed on both sides be merged child by child? Returns
    /// the merged label and value and the child layout.
    fn mergeable(&self, anchor: Anchor) -> Option<(Option<String>, Option<String>, Layout)> {
        let b = &self.trees.base[anchor.base];
        let l = &self.trees.left[anchor.left];
        let r = &self.trees.right[anchor.right];

        if b.kind() != l.kind() || b.kind() != r.kind() {
            return None;
        }
        if b.is_leaf() && l.is_leaf() && r.is_leaf() {
            debug!(base = %anchor.base, "leaf changed on both sides");
            return None;
        }
        let Some(label) = merge_attribute(b.label(), l.label(), r.label()) else {
            debug!(base = %anchor.base, "label changed on both sides");
            return None;
        };
        let value = merge_attribute(b.value(), l.value(), r.value())?;

        let unordered = self.config.unordered_kinds.contains(b.kind());
        let layout = self.layout(unordered, b.children(), l.children(), r.children());
        if layout.order_conflict {
            debug!(base = %anchor.base, "children reordered on both sides");
            return None;
        }
        Some((label.map(str::to_owned), value.map(str::to_owned), layout))
    }

    // -- gaps ---------------------------------------------------------------

    /// Lay out one gap: survivors of one-sided deletions, then insertions.
    ///
    /// Insertions from both sides pair through the left↔right matching or,
    /// failing that, an identical fingerprint. Identical pairs are added once,
    /// differing pairs conflict. If both sides still have unpaired insertions
    /// in an ordered gap, they are zipped into insert/insert conflicts and any
    /// excess is added; otherwise every unpaired insertion is added, left
    /// first.
    fn place_gap(&self, gap: Gap, out: &mut Emitter<'_>) {
        let Gap { left, right } = gap;
        let right_inserted: Vec<NodeId> = right
            .iter()
            .filter_map(|item| match item {
                GapItem::Inserted(node) => Some(*node),
                GapItem::Survivor { .. } => None,
            })
            .collect();

        let mut taken = vec![false; right_inserted.len()];
        let mut paired: HashMap<NodeId, NodeId> = HashMap::new();
        let mut unpaired_left = Vec::new();
        for item in &left {
            if let GapItem::Inserted(node) = item {
                match self.pair_insertion(*node, &right_inserted, &taken) {
                    Some(index) => {
                        taken[index] = true;
                        paired.insert(*node, right_inserted[index]);
                    }
                    None => unpaired_left.push(*node),
                }
            }
        }
        let unpaired_right: Vec<NodeId> = right_inserted
            .iter()
            .zip(&taken)
            .filter(|(_, taken)| !**taken)
            .map(|(node, _)| *node)
            .collect();

        let unordered = out.unordered;
        let zip = !unordered && !unpaired_left.is_empty() && !unpaired_right.is_empty();
        if zip {
            debug!(
                left = unpaired_left.len(),
                right = unpaired_right.len(),
                "concurrent insertions at one position"
            );
        }

        let mut left_rank = 0;
        for item in left {
            match item {
                GapItem::Survivor { base, node } => {
                    if self.changed(Side::Left, base) {
                        out.conflict(ConflictKind::ModifyDelete, Some(base), Some(node), None);
                    } else {
                        out.delete(base);
                    }
                }
                GapItem::Inserted(node) => {
                    if let Some(&partner) = paired.get(&node) {
                        if self.trees.left.fingerprint(node)
                            == self.trees.right.fingerprint(partner)
                        {
                            out.add(NodeRef::new(Revision::Left, node));
                        } else {
                            out.conflict(ConflictKind::InsertInsert, None, Some(node), Some(partner));
                        }
                    } else {
                        match unpaired_right.get(left_rank).filter(|_| zip) {
                            Some(&partner) => out.conflict(
                                ConflictKind::InsertInsert,
                                None,
                                Some(node),
                                Some(partner),
                            ),
                            None => out.add(NodeRef::new(Revision::Left, node)),
                        }
                        left_rank += 1;
                    }
                }
            }
        }

        let mut right_rank = 0;
        for item in right {
            match item {
                GapItem::Survivor { base, node } => {
                    if self.changed(Side::Right, base) {
                        out.conflict(ConflictKind::DeleteModify, Some(base), None, Some(node));
                    } else {
                        out.delete(base);
                    }
                }
                GapItem::Inserted(node) => {
                    let index = right_inserted.iter().position(|n| *n == node);
                    if index.is_some_and(|i| taken[i]) {
                        continue;
                    }
                    if !(zip && right_rank < unpaired_left.len()) {
                        out.add(NodeRef::new(Revision::Right, node));
                    }
                    right_rank += 1;
                }
            }
        }
    }

    /// Index into `candidates` of the right insertion paired with left
    /// insertion `node`.
    fn pair_insertion(&self, node: NodeId, candidates: &[NodeId], taken: &[bool]) -> Option<usize> {
        let free = |i: &usize| !taken[*i];
        if let Some(left_right) = self.matchings.left_right
            && let Some(m) = left_right.forward(node)
            && let Some(index) = candidates.iter().position(|c| *c == m.partner)
            && free(&index)
        {
            return Some(index);
        }
        let fingerprint = self.trees.left.fingerprint(node);
        (0..candidates.len())
            .filter(free)
            .find(|i| self.trees.right.fingerprint(candidates[*i]) == fingerprint)
    }

    /// Did `side` change the subtree of base node `base`?
    fn changed(&self, side: Side, base: NodeId) -> bool {
        let (other, matchings) = match side {
            Side::Left => (self.trees.left, self.matchings.base_left),
            Side::Right => (self.trees.right, self.matchings.base_right),
        };
        has_changes(self.trees.base, base, other, matchings)
    }
}

/// Three-way merge of a node attribute. `None` if both sides changed it
/// differently.
fn merge_attribute<'t>(
    base: Option<&'t str>,
    left: Option<&'t str>,
    right: Option<&'t str>,
) -> Option<Option<&'t str>> {
    if left == base {
        Some(right)
    } else if right == base || left == right {
        Some(left)
    } else {
        None
    }
}

/// Appends operations for the children of one merged node, numbering the
/// child positions as it goes.
struct Emitter<'o> {
    parent: TargetPath,
    next: usize,
    unordered: bool,
    operations: &'o mut Vec<Operation>,
}

impl Emitter<'_> {
    fn slot(&mut self) -> TargetPath {
        let target = self.parent.child(self.next);
        self.next += 1;
        target
    }

    fn keep(&mut self, source: NodeRef) {
        let target = self.slot();
        self.operations.push(Operation::Keep { source, target });
    }

    fn add(&mut self, source: NodeRef) {
        let target = self.slot();
        self.operations.push(Operation::Add { source, target });
    }

    fn delete(&mut self, base: NodeId) {
        self.operations.push(Operation::Delete { base });
    }

    fn merge(
        &mut self,
        anchor: Anchor,
        kind: String,
        label: Option<String>,
        value: Option<String>,
    ) -> TargetPath {
        let target = self.slot();
        self.operations.push(Operation::Merge {
            base: anchor.base,
            left: anchor.left,
            right: anchor.right,
            kind,
            label,
            value,
            target: target.clone(),
        });
        target
    }

    fn conflict(
        &mut self,
        kind: ConflictKind,
        base: Option<NodeId>,
        left: Option<NodeId>,
        right: Option<NodeId>,
    ) {
        let target = self.slot();
        self.operations.push(Operation::Conflict {
            draft: ConflictDraft {
                kind,
                base,
                left,
                right,
            },
            target,
        });
    }
}
