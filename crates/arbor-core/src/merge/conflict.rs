//! Conflict records.

use std::fmt;

use serde::Serialize;

use crate::tree::NodeId;

/// Why a position in the merged tree could not be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides changed the same node incompatibly.
    Content,
    /// Both sides inserted different content at the same position.
    InsertInsert,
    /// Left deleted a node that right modified.
    DeleteModify,
    /// Left modified a node that right deleted.
    ModifyDelete,
}

impl ConflictKind {
    /// The classification string handed to renderers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::InsertInsert => "insert_insert",
            Self::DeleteModify => "delete_modify",
            Self::ModifyDelete => "modify_delete",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conflict as planned, before it has a place in the merged tree.
///
/// `base`, `left` and `right` are node ids in the respective input trees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictDraft {
    /// Classification.
    pub kind: ConflictKind,
    /// The base node, absent for insert/insert.
    pub base: Option<NodeId>,
    /// The left candidate, absent when left deleted.
    pub left: Option<NodeId>,
    /// The right candidate, absent when right deleted.
    pub right: Option<NodeId>,
}

/// An unresolved conflict in a merged tree.
///
/// The placeholder is a `$conflict` node in the merged tree whose `$left` and
/// `$right` children hold copies of the candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// Classification.
    pub kind: ConflictKind,
    /// Node in the base tree.
    pub base: Option<NodeId>,
    /// Node in the left tree.
    pub left: Option<NodeId>,
    /// Node in the right tree.
    pub right: Option<NodeId>,
    /// The `$conflict` node in the merged tree.
    pub placeholder: NodeId,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(node: Option<NodeId>) -> String {
            node.map_or_else(|| "-".to_owned(), |n| n.to_string())
        }
        write!(
            f,
            "{} conflict at merged node {} (base {}, left {}, right {})",
            self.kind,
            self.placeholder,
            side(self.base),
            side(self.left),
            side(self.right)
        )
    }
}
