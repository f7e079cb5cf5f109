//! Error types for the merge core.
//!
//! Only malformed input is an error. Ambiguous matchings and unresolvable
//! conflicts are ordinary merge output and never surface here.

use std::fmt;

use crate::merge::TargetPath;
use crate::tree::{RawId, Revision};

// ---------------------------------------------------------------------------
// TreeError
// ---------------------------------------------------------------------------

/// A front end handed over a node graph that is not a tree.
///
/// Construction fails fast on the first problem found; nothing is built from
/// a partially valid graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// The graph has no designated root.
    MissingRoot,

    /// A node has an empty type tag.
    MissingKind {
        /// The offending raw node.
        node: RawId,
    },

    /// A node lists a child id that does not exist in the graph.
    DanglingChild {
        /// The parent listing the child.
        parent: RawId,
        /// The id that is out of range.
        child: RawId,
    },

    /// Following child links from `node` leads back to one of its ancestors.
    Cycle {
        /// The node whose child list closes the cycle.
        node: RawId,
        /// The ancestor reached again.
        ancestor: RawId,
    },

    /// A node is listed as a child of two different parents.
    SharedChild {
        /// The node reachable twice.
        child: RawId,
        /// The parent that claimed it first.
        first_parent: RawId,
        /// The second parent.
        second_parent: RawId,
    },

    /// The reachable tree exceeds the caller's node ceiling.
    TooLarge {
        /// Reachable node count (counted up to the first overflow).
        nodes: usize,
        /// The configured ceiling.
        limit: usize,
    },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "node graph has no root"),
            Self::MissingKind { node } => write!(f, "node {node} has an empty kind"),
            Self::DanglingChild { parent, child } => {
                write!(f, "node {parent} lists unknown child {child}")
            }
            Self::Cycle { node, ancestor } => {
                write!(f, "node {node} links back to its ancestor {ancestor}")
            }
            Self::SharedChild {
                child,
                first_parent,
                second_parent,
            } => write!(
                f,
                "node {child} has two parents ({first_parent} and {second_parent})"
            ),
            Self::TooLarge { nodes, limit } => {
                write!(f, "tree has more than {limit} nodes (saw {nodes})")
            }
        }
    }
}

impl std::error::Error for TreeError {}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// The merge inputs do not fit together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeError {
    /// A tree was passed in a role that does not match its revision tag.
    RevisionMismatch {
        /// The revision the role requires.
        expected: Revision,
        /// The revision the tree carries.
        found: Revision,
    },

    /// A matching side table belongs to a different pair of trees.
    MatchingsMismatch {
        /// The revision pair the role requires.
        expected: (Revision, Revision),
        /// The revision pair the table was computed for.
        found: (Revision, Revision),
        /// Extra detail when the revisions agree but the node counts do not.
        detail: Option<String>,
    },

    /// An operation cannot be applied to the tree under construction: its
    /// parent does not exist yet, it skips a sibling position, or it names a
    /// node the inputs do not have.
    InvalidOperation {
        /// Where the operation wanted to place its node.
        target: TargetPath,
        /// What is wrong.
        reason: &'static str,
    },

    /// An input tree failed validation.
    Tree(TreeError),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RevisionMismatch { expected, found } => {
                write!(f, "expected a {expected} tree, got a {found} tree")
            }
            Self::MatchingsMismatch {
                expected,
                found,
                detail,
            } => {
                write!(
                    f,
                    "expected {}↔{} matchings, got {}↔{}",
                    expected.0, expected.1, found.0, found.1
                )?;
                if let Some(detail) = detail {
                    write!(f, " ({detail})")?;
                }
                Ok(())
            }
            Self::InvalidOperation { target, reason } => {
                write!(f, "cannot apply operation at {target}: {reason}")
            }
            Self::Tree(e) => write!(f, "invalid tree: {e}"),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::Tree(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<TreeError> for MergeError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}
