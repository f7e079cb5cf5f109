//! The front-end contract: a flat graph of raw nodes.
//!
//! Front ends only ever produce [`NodeGraph`]s. A raw node exposes exactly
//! the capabilities the core needs: a type tag, an optional label and leaf
//! value (the fingerprint seed), and an ordered child list. Nothing stops a
//! front end from producing a graph that is not a tree; that is caught by
//! [`ArtifactTree::from_graph`](super::ArtifactTree::from_graph).

use std::fmt;

use crate::error::TreeError;

use super::artifact::{EMPTY_KIND, NodeRef};

// ---------------------------------------------------------------------------
// RawId
// ---------------------------------------------------------------------------

/// Index of a node inside a [`NodeGraph`].
///
/// Raw ids are whatever order the front end allocated nodes in. They carry no
/// meaning after the graph is turned into an [`ArtifactTree`](super::ArtifactTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId(usize);

impl RawId {
    /// Wrap a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RawNode
// ---------------------------------------------------------------------------

/// One node as supplied by a front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawNode {
    /// Type tag, e.g. `"function_item"`. Must not be empty.
    pub kind: String,
    /// Identifier used when scoring candidate matches (a function name, a
    /// key). Part of the fingerprint.
    pub label: Option<String>,
    /// Leaf text. Part of the fingerprint.
    pub value: Option<String>,
    /// Ordered children.
    pub children: Vec<RawId>,
    pub(crate) origin: Option<NodeRef>,
}

impl RawNode {
    /// A childless node with the given kind and no label or value.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: None,
            value: None,
            children: Vec::new(),
            origin: None,
        }
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the leaf value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Replace the child list.
    #[must_use]
    pub fn with_children(mut self, children: Vec<RawId>) -> Self {
        self.children = children;
        self
    }
}

// ---------------------------------------------------------------------------
// NodeGraph
// ---------------------------------------------------------------------------

/// An arena of raw nodes plus a designated root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeGraph {
    nodes: Vec<RawNode>,
    root: Option<RawId>,
}

impl NodeGraph {
    /// An empty graph with no root. Not a valid tree until a root is set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// The "empty artifact": a single childless node of kind [`EMPTY_KIND`].
    #[must_use]
    pub fn empty() -> Self {
        let mut graph = Self::new();
        let root = graph.add_node(EMPTY_KIND);
        graph.set_root(root);
        graph
    }

    /// Build a graph from nodes assembled elsewhere. No validation happens
    /// here.
    #[must_use]
    pub const fn from_nodes(nodes: Vec<RawNode>, root: Option<RawId>) -> Self {
        Self { nodes, root }
    }

    /// Append a childless node of the given kind.
    pub fn add_node(&mut self, kind: impl Into<String>) -> RawId {
        self.push(RawNode::new(kind))
    }

    /// Append a leaf carrying text.
    pub fn add_leaf(&mut self, kind: impl Into<String>, value: impl Into<String>) -> RawId {
        self.push(RawNode::new(kind).with_value(value))
    }

    /// Append a fully formed raw node.
    pub fn push(&mut self, node: RawNode) -> RawId {
        let id = RawId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Set the label of an existing node. Unknown ids are ignored.
    pub fn set_label(&mut self, id: RawId, label: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.label = Some(label.into());
        }
    }

    /// Append `child` to `parent`'s child list.
    ///
    /// # Errors
    /// Returns [`TreeError::DanglingChild`] if either id is not in this graph.
    pub fn push_child(&mut self, parent: RawId, child: RawId) -> Result<(), TreeError> {
        if child.0 >= self.nodes.len() {
            return Err(TreeError::DanglingChild { parent, child });
        }
        match self.nodes.get_mut(parent.0) {
            Some(node) => {
                node.children.push(child);
                Ok(())
            }
            None => Err(TreeError::DanglingChild { parent, child }),
        }
    }

    /// Designate the root.
    pub const fn set_root(&mut self, root: RawId) {
        self.root = Some(root);
    }

    /// The designated root, if any.
    #[must_use]
    pub const fn root(&self) -> Option<RawId> {
        self.root
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: RawId) -> Option<&RawNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, reachable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn set_origin(&mut self, id: RawId, origin: NodeRef) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.origin = Some(origin);
        }
    }

    pub(crate) fn link(&mut self, parent: RawId, child: RawId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }
}

// ---------------------------------------------------------------------------
// NodeSpec
// ---------------------------------------------------------------------------

/// Recursive shorthand for small trees, lowered with [`NodeSpec::into_graph`].
///
/// ```
/// use arbor_core::NodeSpec;
///
/// let class = NodeSpec::node("class", [
///     NodeSpec::leaf("field", "int x;"),
///     NodeSpec::leaf("field", "int y;"),
/// ])
/// .labeled("Point");
/// assert_eq!(class.into_graph().len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    /// Type tag.
    pub kind: String,
    /// Optional label.
    pub label: Option<String>,
    /// Optional leaf value.
    pub value: Option<String>,
    /// Ordered children.
    pub children: Vec<Self>,
}

impl NodeSpec {
    /// A leaf carrying text.
    #[must_use]
    pub fn leaf(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: None,
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// An inner node.
    #[must_use]
    pub fn node(kind: impl Into<String>, children: impl IntoIterator<Item = Self>) -> Self {
        Self {
            kind: kind.into(),
            label: None,
            value: None,
            children: children.into_iter().collect(),
        }
    }

    /// Attach a label.
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Lower into a [`NodeGraph`] rooted at this spec. Raw ids come out in
    /// pre-order.
    #[must_use]
    pub fn into_graph(self) -> NodeGraph {
        let mut graph = NodeGraph::new();
        let mut stack: Vec<(Self, Option<RawId>)> = vec![(self, None)];

        while let Some((spec, parent)) = stack.pop() {
            let Self {
                kind,
                label,
                value,
                children,
            } = spec;
            let id = graph.push(RawNode {
                kind,
                label,
                value,
                children: Vec::new(),
                origin: None,
            });
            match parent {
                Some(parent) => graph.link(parent, id),
                None => graph.set_root(id),
            }
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }

        graph
    }
}
