//! [`ArtifactTree`]: a validated, numbered, fingerprinted revision tree.

use std::fmt;
use std::ops::Index;

use serde::Serialize;

use crate::error::TreeError;

use super::fingerprint::Fingerprint;
use super::graph::{NodeGraph, RawId};
use super::revision::Revision;

/// Kind of the placeholder node a front end yields for an empty artifact.
pub const EMPTY_KIND: &str = "$empty";
/// Kind of the synthetic root wrapping several surviving top-level nodes.
pub const ROOT_KIND: &str = "$root";
/// Kind of a conflict placeholder in a merged tree.
pub const CONFLICT_KIND: &str = "$conflict";
/// Kind of the conflict child holding the left candidate.
pub const CONFLICT_LEFT_KIND: &str = "$left";
/// Kind of the conflict child holding the right candidate.
pub const CONFLICT_RIGHT_KIND: &str = "$right";

// ---------------------------------------------------------------------------
// NodeId / NodeRef
// ---------------------------------------------------------------------------

/// Pre-order ordinal of a node within its tree.
///
/// Unique within one tree and stable for that tree's lifetime. Ids from
/// different trees are unrelated; use [`NodeRef`] when the revision matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Wrap an ordinal.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The ordinal.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node qualified by the revision tree it lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    /// Which tree.
    pub revision: Revision,
    /// Which node in that tree.
    pub node: NodeId,
}

impl NodeRef {
    /// Qualify `node` with `revision`.
    #[must_use]
    pub const fn new(revision: Revision, node: NodeId) -> Self {
        Self { revision, node }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.revision, self.node)
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// One node of an [`ArtifactTree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    number: NodeId,
    kind: String,
    label: Option<String>,
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    fingerprint: Fingerprint,
    size: usize,
    origin: Option<NodeRef>,
}

impl Artifact {
    /// Pre-order ordinal.
    #[must_use]
    pub const fn number(&self) -> NodeId {
        self.number
    }

    /// Type tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Identifier used for similarity scoring.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Leaf text.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The text compared when scoring a candidate match: the label if there
    /// is one, the leaf value otherwise.
    #[must_use]
    pub fn descriptor(&self) -> Option<&str> {
        self.label().or_else(|| self.value())
    }

    /// Parent, `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered children.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Content hash of the subtree rooted here.
    #[must_use]
    pub const fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Number of nodes in the subtree rooted here, including this one.
    #[must_use]
    pub const fn tree_size(&self) -> usize {
        self.size
    }

    /// For merged-tree nodes, the input node this one was copied from.
    #[must_use]
    pub const fn origin(&self) -> Option<NodeRef> {
        self.origin
    }
}

// ---------------------------------------------------------------------------
// ArtifactTree
// ---------------------------------------------------------------------------

/// A validated revision tree.
///
/// Invariants, held for every tree handed out by this module:
///
/// - nodes are stored in pre-order, so a node's id is its ordinal and its
///   subtree is the id range `[id, id + tree_size)`;
/// - fingerprints and sizes agree with the current children;
/// - every node has exactly one parent except the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactTree {
    revision: Revision,
    root: NodeId,
    nodes: Vec<Artifact>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    Pending,
    Open,
    Closed,
}

enum Frame {
    Enter(RawId),
    Exit(RawId),
}

impl ArtifactTree {
    /// Validate `graph` and build the tree for `revision`.
    ///
    /// # Errors
    /// Returns a [`TreeError`] if the graph has no root, a node with an empty
    /// kind, a dangling child link, a cycle, or a node with two parents.
    pub fn from_graph(graph: NodeGraph, revision: Revision) -> Result<Self, TreeError> {
        Self::from_graph_with_limit(graph, revision, usize::MAX)
    }

    /// Like [`from_graph`](Self::from_graph) but refuses trees with more than
    /// `max_nodes` reachable nodes.
    ///
    /// # Errors
    /// As [`from_graph`](Self::from_graph), plus [`TreeError::TooLarge`].
    pub fn from_graph_with_limit(
        graph: NodeGraph,
        revision: Revision,
        max_nodes: usize,
    ) -> Result<Self, TreeError> {
        Self::build(graph, revision, max_nodes).map(|(tree, _)| tree)
    }

    /// Build the tree and report where each raw node ended up. Unreachable
    /// raw nodes map to `None`.
    pub(crate) fn build(
        graph: NodeGraph,
        revision: Revision,
        max_nodes: usize,
    ) -> Result<(Self, Vec<Option<NodeId>>), TreeError> {
        let reachable = validate(&graph, max_nodes)?;
        let root = graph.root().ok_or(TreeError::MissingRoot)?;

        // Provisional ids: reachable raw nodes in allocation order.
        let mut provisional: Vec<Option<NodeId>> = vec![None; graph.len()];
        let mut order: Vec<RawId> = reachable;
        order.sort_unstable();
        for (index, raw) in order.iter().enumerate() {
            provisional[raw.index()] = Some(NodeId(index));
        }

        let placeholder = Fingerprint::of_node("", None, None, std::iter::empty());
        let mut nodes = Vec::with_capacity(order.len());
        for (index, raw) in order.iter().enumerate() {
            let Some(node) = graph.node(*raw) else {
                continue;
            };
            nodes.push(Artifact {
                number: NodeId(index),
                kind: node.kind.clone(),
                label: node.label.clone(),
                value: node.value.clone(),
                parent: None,
                children: node
                    .children
                    .iter()
                    .filter_map(|child| provisional[child.index()])
                    .collect(),
                fingerprint: placeholder,
                size: 1,
                origin: node.origin,
            });
        }

        let root = provisional[root.index()].ok_or(TreeError::MissingRoot)?;
        let mut tree = Self {
            revision,
            root,
            nodes,
        };
        let renumbered = tree.renumber_with_map();
        tree.initialize_children();

        let mapping = provisional
            .into_iter()
            .map(|slot| slot.and_then(|id| renumbered[id.0]))
            .collect();
        Ok((tree, mapping))
    }

    /// Reassign ordinals by a pre-order walk from the root.
    ///
    /// Idempotent: running it on a tree that is already in pre-order changes
    /// nothing. Every public constructor leaves the tree in pre-order.
    pub fn renumber(&mut self) {
        let _ = self.renumber_with_map();
    }

    /// Renumber and return, for each old id, its new id (`None` for nodes
    /// not reachable from the root, which are dropped).
    fn renumber_with_map(&mut self) -> Vec<Option<NodeId>> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }

        let mut old_to_new: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            old_to_new[old.0] = Some(NodeId(new));
        }

        let mut slots: Vec<Option<Artifact>> = self.nodes.drain(..).map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for (new, old) in order.iter().enumerate() {
            let Some(mut node) = slots[old.0].take() else {
                continue;
            };
            node.number = NodeId(new);
            node.parent = node.parent.and_then(|p| old_to_new[p.0]);
            node.children = node
                .children
                .iter()
                .filter_map(|c| old_to_new[c.0])
                .collect();
            nodes.push(node);
        }

        self.nodes = nodes;
        self.root = NodeId(0);
        old_to_new
    }

    /// Wire parent links and recompute fingerprints and sizes bottom-up.
    ///
    /// Uses an explicit stack, so depth is bounded only by memory.
    pub fn initialize_children(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        self.nodes[self.root.0].parent = None;

        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                let node = &self.nodes[id.0];
                let fingerprint = Fingerprint::of_node(
                    &node.kind,
                    node.label.as_deref(),
                    node.value.as_deref(),
                    node.children.iter().map(|c| &self.nodes[c.0].fingerprint),
                );
                let size = 1 + node
                    .children
                    .iter()
                    .map(|c| self.nodes[c.0].size)
                    .sum::<usize>();
                let node = &mut self.nodes[id.0];
                node.fingerprint = fingerprint;
                node.size = size;
            } else {
                stack.push((id, true));
                let children = self.nodes[id.0].children.clone();
                for child in children.into_iter().rev() {
                    self.nodes[child.0].parent = Some(id);
                    stack.push((child, false));
                }
            }
        }
    }

    // -- queries ------------------------------------------------------------

    /// Which revision this tree is.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree has at least its root. See
    /// [`is_empty_artifact`](Self::is_empty_artifact) for the front end's
    /// "nothing here" placeholder.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether this tree is the empty-artifact placeholder.
    #[must_use]
    pub fn is_empty_artifact(&self) -> bool {
        let root = &self.nodes[self.root.0];
        root.kind == EMPTY_KIND && root.children.is_empty()
    }

    /// Look up a node, `None` if the id is out of range.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Artifact> {
        self.nodes.get(id.0)
    }

    /// Ordered children of `id`.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    /// Parent of `id`.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    /// Fingerprint of the subtree rooted at `id`.
    #[must_use]
    pub fn fingerprint(&self, id: NodeId) -> Fingerprint {
        self[id].fingerprint
    }

    /// Size of the subtree rooted at `id`.
    #[must_use]
    pub fn tree_size(&self, id: NodeId) -> usize {
        self[id].size
    }

    /// Whether `node` lies in the subtree rooted at `ancestor` (inclusive).
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node.0 >= ancestor.0 && node.0 < ancestor.0 + self[ancestor].size
    }

    /// Position of `id` among its siblings.
    #[must_use]
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self[id].parent?;
        self[parent].children.iter().position(|c| *c == id)
    }

    /// All node ids in pre-order.
    pub fn preorder(&self) -> impl ExactSizeIterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Ids of the subtree rooted at `id`, in pre-order.
    pub fn subtree(&self, id: NodeId) -> impl ExactSizeIterator<Item = NodeId> + use<> {
        (id.0..id.0 + self[id].size).map(NodeId)
    }

    /// All nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.nodes.iter()
    }

    /// Compact one-line rendering of a subtree, for logs and tests.
    ///
    /// Each node prints as its kind, then `[label]` and `:value` when
    /// present, then its children in parentheses:
    /// `class[Point](field:x,field:y)`.
    #[must_use]
    pub fn outline(&self, id: NodeId) -> String {
        enum Step {
            Node(NodeId),
            Text(&'static str),
        }

        let mut out = String::new();
        let mut stack = vec![Step::Node(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Text(text) => out.push_str(text),
                Step::Node(id) => {
                    let node = &self[id];
                    out.push_str(&node.kind);
                    if let Some(label) = &node.label {
                        out.push('[');
                        out.push_str(label);
                        out.push(']');
                    }
                    if let Some(value) = &node.value {
                        out.push(':');
                        out.push_str(value);
                    }
                    if node.children.is_empty() {
                        continue;
                    }
                    out.push('(');
                    stack.push(Step::Text(")"));
                    for (i, child) in node.children.iter().enumerate().rev() {
                        stack.push(Step::Node(*child));
                        if i > 0 {
                            stack.push(Step::Text(","));
                        }
                    }
                }
            }
        }
        out
    }
}

impl Index<NodeId> for ArtifactTree {
    type Output = Artifact;

    /// # Panics
    /// Panics if `id` does not belong to this tree.
    fn index(&self, id: NodeId) -> &Artifact {
        &self.nodes[id.0]
    }
}

impl fmt::Display for ArtifactTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.outline(self.root))
    }
}

/// Walk the graph from its root, rejecting anything that is not a tree.
/// Returns the reachable raw ids.
fn validate(graph: &NodeGraph, max_nodes: usize) -> Result<Vec<RawId>, TreeError> {
    let root = graph.root().ok_or(TreeError::MissingRoot)?;
    if root.index() >= graph.len() {
        return Err(TreeError::MissingRoot);
    }

    let mut visit = vec![Visit::Unseen; graph.len()];
    let mut parent_of: Vec<Option<RawId>> = vec![None; graph.len()];
    let mut reachable = Vec::new();
    let mut stack = vec![Frame::Enter(root)];
    visit[root.index()] = Visit::Pending;

    while let Some(frame) = stack.pop() {
        let id = match frame {
            Frame::Exit(id) => {
                visit[id.index()] = Visit::Closed;
                continue;
            }
            Frame::Enter(id) => id,
        };

        visit[id.index()] = Visit::Open;
        reachable.push(id);
        if reachable.len() > max_nodes {
            return Err(TreeError::TooLarge {
                nodes: reachable.len(),
                limit: max_nodes,
            });
        }

        let Some(node) = graph.node(id) else {
            return Err(TreeError::MissingRoot);
        };
        if node.kind.is_empty() {
            return Err(TreeError::MissingKind { node: id });
        }

        stack.push(Frame::Exit(id));
        for &child in node.children.iter().rev() {
            if child.index() >= graph.len() {
                return Err(TreeError::DanglingChild { parent: id, child });
            }
            match visit[child.index()] {
                Visit::Unseen => {
                    visit[child.index()] = Visit::Pending;
                    parent_of[child.index()] = Some(id);
                    stack.push(Frame::Enter(child));
                }
                Visit::Open => {
                    return Err(TreeError::Cycle {
                        node: id,
                        ancestor: child,
                    });
                }
                Visit::Pending | Visit::Closed => {
                    return Err(TreeError::SharedChild {
                        child,
                        first_parent: parent_of[child.index()].unwrap_or(child),
                        second_parent: id,
                    });
                }
            }
        }
    }

    Ok(reachable)
}
