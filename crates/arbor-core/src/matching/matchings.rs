use crate::error::MergeError;
use crate::tree::{ArtifactTree, NodeId, NodeRef, Revision};

use super::score::Score;

/// One side of a committed pair: the partner node and the pair's score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// The node on the other side.
    pub partner: NodeId,
    /// Similarity when the pair was committed.
    pub score: Score,
}

/// Side table of matched node pairs between an X tree and a Y tree.
///
/// Lookup is O(1) in both directions. Injective and symmetric by
/// construction: [`insert`](Self::insert) refuses a node that is already
/// matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matchings {
    revisions: (Revision, Revision),
    forward: Vec<Option<Match>>,
    backward: Vec<Option<Match>>,
    pairs: usize,
    degraded: bool,
}

impl Matchings {
    /// An empty table sized for `x` and `y`.
    #[must_use]
    pub fn new(x: &ArtifactTree, y: &ArtifactTree) -> Self {
        Self {
            revisions: (x.revision(), y.revision()),
            forward: vec![None; x.len()],
            backward: vec![None; y.len()],
            pairs: 0,
            degraded: false,
        }
    }

    /// An empty table flagged as the product of an aborted matching run.
    #[must_use]
    pub(crate) fn degraded(x: &ArtifactTree, y: &ArtifactTree) -> Self {
        Self {
            degraded: true,
            ..Self::new(x, y)
        }
    }

    /// The `(x, y)` revisions this table was built for.
    #[must_use]
    pub const fn revisions(&self) -> (Revision, Revision) {
        self.revisions
    }

    /// Number of matched pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pairs
    }

    /// Whether no pair is matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    /// Whether matching gave up on its pair budget. A degraded table is
    /// empty; every node counts as unmatched.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Record `x ↔ y`. Returns `false` and changes nothing if either node is
    /// already matched or out of range.
    pub fn insert(&mut self, x: NodeId, y: NodeId, score: Score) -> bool {
        let free = matches!(self.forward.get(x.index()), Some(None))
            && matches!(self.backward.get(y.index()), Some(None));
        if !free {
            return false;
        }
        self.forward[x.index()] = Some(Match { partner: y, score });
        self.backward[y.index()] = Some(Match { partner: x, score });
        self.pairs += 1;
        true
    }

    /// The match of X node `x`.
    #[must_use]
    pub fn forward(&self, x: NodeId) -> Option<Match> {
        self.forward.get(x.index()).copied().flatten()
    }

    /// The match of Y node `y`.
    #[must_use]
    pub fn backward(&self, y: NodeId) -> Option<Match> {
        self.backward.get(y.index()).copied().flatten()
    }

    /// The match of `node`, looked up on whichever side its revision names.
    /// `None` if the revision is neither side of this table.
    #[must_use]
    pub fn get(&self, node: NodeRef) -> Option<Match> {
        if node.revision == self.revisions.0 {
            self.forward(node.node)
        } else if node.revision == self.revisions.1 {
            self.backward(node.node)
        } else {
            None
        }
    }

    /// The partner of `node` in the other tree.
    #[must_use]
    pub fn counterpart(&self, node: NodeRef) -> Option<NodeId> {
        self.get(node).map(|m| m.partner)
    }

    /// Whether `node` is matched.
    #[must_use]
    pub fn has_matching(&self, node: NodeRef) -> bool {
        self.get(node).is_some()
    }

    /// Matched pairs `(x, y, score)` in X pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId, Score)> + '_ {
        self.forward.iter().enumerate().filter_map(|(x, slot)| {
            slot.map(|m| (NodeId::new(x), m.partner, m.score))
        })
    }

    /// Check that this table was computed for `x` and `y`.
    ///
    /// # Errors
    /// [`MergeError::MatchingsMismatch`] if the revisions differ or the table
    /// is sized for different trees.
    pub fn fits(&self, x: &ArtifactTree, y: &ArtifactTree) -> Result<(), MergeError> {
        let expected = (x.revision(), y.revision());
        if self.revisions != expected {
            return Err(MergeError::MatchingsMismatch {
                expected,
                found: self.revisions,
                detail: None,
            });
        }
        if self.forward.len() != x.len() || self.backward.len() != y.len() {
            return Err(MergeError::MatchingsMismatch {
                expected,
                found: self.revisions,
                detail: Some(format!(
                    "table covers {}↔{} nodes, trees have {}↔{}",
                    self.forward.len(),
                    self.backward.len(),
                    x.len(),
                    y.len()
                )),
            });
        }
        Ok(())
    }
}
