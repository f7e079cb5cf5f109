use std::collections::VecDeque;

use crate::matching::Matchings;

use super::artifact::{ArtifactTree, NodeId, NodeRef};

/// Does the subtree at `node` in `tree` differ from its counterpart in
/// `other`?
///
/// Returns `false` only when `tree` and `other` are the same revision, or when
/// every node of the subtree is matched into `other` to a node with an
/// identical fingerprint. A subtree-size mismatch with the direct counterpart
/// short-circuits to `true`. The walk is breadth-first in child order, so the
/// first difference found is the same on every run.
#[must_use]
pub fn has_changes(
    tree: &ArtifactTree,
    node: NodeId,
    other: &ArtifactTree,
    matchings: &Matchings,
) -> bool {
    if tree.revision() == other.revision() {
        return false;
    }

    let revision = tree.revision();
    let Some(partner) = matchings.counterpart(NodeRef::new(revision, node)) else {
        return true;
    };
    let Some(partner) = other.get(partner) else {
        return true;
    };
    if partner.tree_size() != tree.tree_size(node) {
        return true;
    }

    let mut queue = VecDeque::from([node]);
    while let Some(id) = queue.pop_front() {
        let same = matchings
            .counterpart(NodeRef::new(revision, id))
            .and_then(|c| other.get(c))
            .is_some_and(|c| c.fingerprint() == tree.fingerprint(id));
        if !same {
            return true;
        }
        queue.extend(tree.children(id).iter().copied());
    }
    false
}
