//! Operations: the planner's output and the builder's input.
//!
//! The planner emits operations in traversal order. Each one that places a
//! node names its position in the merged tree by [`TargetPath`]; applying the
//! sequence in order only ever appends to the tree under construction.

use std::fmt;

use serde::Serialize;

use crate::tree::{NodeId, NodeRef};

use super::conflict::ConflictDraft;

/// Child-position path from the merged tree's top level.
///
/// The empty path is the synthetic top-level parent; `[0]` is the first
/// top-level node (normally the root), `[0, 2]` its third child.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetPath(Vec<usize>);

impl TargetPath {
    /// The synthetic top-level parent.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// The path of this node's `index`-th child.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    /// The parent path and this node's position under it. `None` for the
    /// synthetic root.
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, usize)> {
        let (last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), *last))
    }

    /// Path segments.
    #[must_use]
    pub fn segments(&self) -> &[usize] {
        &self.0
    }
}

impl<const N: usize> From<[usize; N]> for TargetPath {
    fn from(value: [usize; N]) -> Self {
        Self(value.to_vec())
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// One step in building the merged tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Copy a base-anchored subtree: the base version when neither side
    /// changed it, otherwise the single changed (or convergent) version.
    Keep {
        /// The subtree to copy.
        source: NodeRef,
        /// Where it goes.
        target: TargetPath,
    },

    /// Copy a subtree one side inserted.
    Add {
        /// The inserted subtree.
        source: NodeRef,
        /// Where it goes.
        target: TargetPath,
    },

    /// Create a node from a triple changed on both sides. Its children are
    /// placed by the operations that follow.
    Merge {
        /// The base node.
        base: NodeId,
        /// The left node.
        left: NodeId,
        /// The right node.
        right: NodeId,
        /// Kind shared by all three.
        kind: String,
        /// Three-way merged label.
        label: Option<String>,
        /// Three-way merged value.
        value: Option<String>,
        /// Where it goes.
        target: TargetPath,
    },

    /// Drop a base node. Places nothing; kept for the record.
    Delete {
        /// The base node.
        base: NodeId,
    },

    /// Place a conflict placeholder.
    Conflict {
        /// The candidates.
        draft: ConflictDraft,
        /// Where the placeholder goes.
        target: TargetPath,
    },
}

impl Operation {
    /// The position this operation fills, `None` for deletions.
    #[must_use]
    pub const fn target(&self) -> Option<&TargetPath> {
        match self {
            Self::Keep { target, .. }
            | Self::Add { target, .. }
            | Self::Merge { target, .. }
            | Self::Conflict { target, .. } => Some(target),
            Self::Delete { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep { source, target } => write!(f, "keep {source} at {target}"),
            Self::Add { source, target } => write!(f, "add {source} at {target}"),
            Self::Merge {
                base,
                left,
                right,
                target,
                ..
            } => write!(f, "merge base:{base} left:{left} right:{right} at {target}"),
            Self::Delete { base } => write!(f, "delete base:{base}"),
            Self::Conflict { draft, target } => write!(f, "{} conflict at {target}", draft.kind),
        }
    }
}
