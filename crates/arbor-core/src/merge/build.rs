//! Applying operations to assemble the merged tree.

use std::collections::HashMap;

use crate::error::MergeError;
use crate::tree::{
    ArtifactTree, CONFLICT_KIND, CONFLICT_LEFT_KIND, CONFLICT_RIGHT_KIND, EMPTY_KIND, NodeGraph,
    NodeId, NodeRef, ROOT_KIND, RawId, RawNode, Revision,
};

use super::conflict::{Conflict, ConflictDraft};
use super::operation::{Operation, TargetPath};
use super::MergeTrees;

/// Builds the merged tree from an operation sequence.
///
/// Operations only ever append: each one attaches a node as the next child of
/// an already placed parent. An operation whose target already exists is
/// skipped, so replaying a sequence is harmless.
#[derive(Debug)]
pub struct MergedTreeBuilder<'a> {
    trees: MergeTrees<'a>,
    graph: NodeGraph,
    placed: HashMap<TargetPath, RawId>,
    conflicts: Vec<(RawId, ConflictDraft)>,
}

impl<'a> MergedTreeBuilder<'a> {
    /// A builder holding only the synthetic top-level parent.
    #[must_use]
    pub fn new(trees: MergeTrees<'a>) -> Self {
        let mut graph = NodeGraph::new();
        let top = graph.add_node(ROOT_KIND);
        graph.set_root(top);
        Self {
            trees,
            graph,
            placed: HashMap::from([(TargetPath::root(), top)]),
            conflicts: Vec::new(),
        }
    }

    /// Apply one operation.
    ///
    /// # Errors
    /// [`MergeError::InvalidOperation`] if the target's parent is not placed
    /// yet, an earlier sibling position is still empty, or a source node does
    /// not exist.
    pub fn apply(&mut self, operation: &Operation) -> Result<(), MergeError> {
        let Some(target) = operation.target() else {
            return Ok(());
        };
        if self.placed.contains_key(target) {
            return Ok(());
        }
        let parent = self.parent_of(target)?;

        let node = match operation {
            Operation::Keep { source, .. } | Operation::Add { source, .. } => {
                self.copy_subtree(*source, target)?
            }
            Operation::Merge {
                base,
                kind,
                label,
                value,
                ..
            } => {
                let mut node = RawNode::new(kind.clone());
                node.label.clone_from(label);
                node.value.clone_from(value);
                let id = self.graph.push(node);
                self.graph
                    .set_origin(id, NodeRef::new(Revision::Base, *base));
                id
            }
            Operation::Conflict { draft, .. } => self.conflict_placeholder(draft, target)?,
            Operation::Delete { .. } => return Ok(()),
        };

        self.graph.link(parent, node);
        self.placed.insert(target.clone(), node);
        Ok(())
    }

    /// Finish the tree.
    ///
    /// A single top-level node becomes the root. No top-level node yields the
    /// empty artifact; several stay wrapped in a `$root` node.
    ///
    /// # Errors
    /// [`MergeError::Tree`] if the assembled graph is not a valid tree, which
    /// the append-only discipline rules out for well-formed operations.
    pub fn finish(mut self) -> Result<(ArtifactTree, Vec<Conflict>), MergeError> {
        let top = self.placed[&TargetPath::root()];
        let top_level = self
            .graph
            .node(top)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        match top_level.as_slice() {
            [] => {
                let empty = self.graph.add_node(EMPTY_KIND);
                self.graph.set_root(empty);
            }
            [only] => self.graph.set_root(*only),
            _ => {}
        }

        let (tree, mapping) = ArtifactTree::build(self.graph, Revision::Merged, usize::MAX)?;
        let mut conflicts: Vec<Conflict> = self
            .conflicts
            .into_iter()
            .filter_map(|(raw, draft)| {
                let placeholder = mapping.get(raw.index()).copied().flatten()?;
                Some(Conflict {
                    kind: draft.kind,
                    base: draft.base,
                    left: draft.left,
                    right: draft.right,
                    placeholder,
                })
            })
            .collect();
        conflicts.sort_by_key(|c| c.placeholder);
        Ok((tree, conflicts))
    }

    fn parent_of(&self, target: &TargetPath) -> Result<RawId, MergeError> {
        let invalid = |reason| MergeError::InvalidOperation {
            target: target.clone(),
            reason,
        };
        let (parent_path, index) = target
            .split_last()
            .ok_or_else(|| invalid("the top level cannot be replaced"))?;
        let parent = *self
            .placed
            .get(&parent_path)
            .ok_or_else(|| invalid("parent has not been placed"))?;
        let siblings = self.graph.node(parent).map_or(0, |node| node.children.len());
        if siblings != index {
            return Err(invalid("sibling positions must be filled in order"));
        }
        Ok(parent)
    }

    /// Copy the subtree at `source` into the graph and return its top node.
    /// Every copied node records where it came from.
    fn copy_subtree(&mut self, source: NodeRef, target: &TargetPath) -> Result<RawId, MergeError> {
        let tree = self
            .trees
            .get(source.revision)
            .filter(|tree| tree.get(source.node).is_some())
            .ok_or_else(|| MergeError::InvalidOperation {
                target: target.clone(),
                reason: "source node does not exist",
            })?;

        let mut top = None;
        let mut stack: Vec<(NodeId, Option<RawId>)> = vec![(source.node, None)];
        while let Some((id, parent)) = stack.pop() {
            let artifact = &tree[id];
            let mut node = RawNode::new(artifact.kind());
            node.label = artifact.label().map(str::to_owned);
            node.value = artifact.value().map(str::to_owned);
            let raw = self.graph.push(node);
            self.graph
                .set_origin(raw, NodeRef::new(source.revision, id));
            match parent {
                Some(parent) => self.graph.link(parent, raw),
                None => top = Some(raw),
            }
            stack.extend(artifact.children().iter().rev().map(|c| (*c, Some(raw))));
        }

        top.ok_or_else(|| MergeError::InvalidOperation {
            target: target.clone(),
            reason: "source node does not exist",
        })
    }

    /// `$conflict[kind]($left(candidate), $right(candidate))`.
    fn conflict_placeholder(
        &mut self,
        draft: &ConflictDraft,
        target: &TargetPath,
    ) -> Result<RawId, MergeError> {
        let placeholder = self
            .graph
            .push(RawNode::new(CONFLICT_KIND).with_label(draft.kind.as_str()));

        for (kind, revision, candidate) in [
            (CONFLICT_LEFT_KIND, Revision::Left, draft.left),
            (CONFLICT_RIGHT_KIND, Revision::Right, draft.right),
        ] {
            let side = self.graph.add_node(kind);
            self.graph.link(placeholder, side);
            if let Some(node) = candidate {
                let copy = self.copy_subtree(NodeRef::new(revision, node), target)?;
                self.graph.link(side, copy);
            }
        }

        self.conflicts.push((placeholder, draft.clone()));
        Ok(placeholder)
    }
}
