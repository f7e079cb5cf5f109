use std::collections::BTreeSet;

use super::handlers::MatchingHandlers;
use super::score::Score;

/// Relative weight of each similarity signal.
///
/// A signal that does not apply to a pair (no label on either side, both
/// nodes leaves) drops out of the weighted mean instead of scoring zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreWeights {
    /// Kind equality.
    pub kind: u16,
    /// Label (or leaf value) bigram similarity.
    pub label: u16,
    /// Dice ratio of matched descendants. Inner nodes only.
    pub children: u16,
    /// Parents matched to each other (or both roots).
    pub parent: u16,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            kind: 1,
            label: 2,
            children: 3,
            parent: 1,
        }
    }
}

/// Tuning for [`match_trees`](super::match_trees).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Signal weights.
    pub weights: ScoreWeights,
    /// A scored pair is committed only if its score is strictly above this.
    pub acceptance_threshold: Score,
    /// Two subtrees are comparable if their sizes differ by at most this
    /// percentage of the larger one...
    pub size_tolerance_pct: u16,
    /// ...or by at most this many nodes.
    pub size_slack: usize,
    /// Ceiling on scored candidate pairs. Past it matching gives up and
    /// returns a degraded, empty table. `None` disables the ceiling.
    pub max_compared_pairs: Option<u64>,
    /// Kinds whose children form an unordered collection. Their children are
    /// paired by optimal assignment instead of an order-preserving alignment.
    pub unordered_kinds: BTreeSet<String>,
    /// Per-kind identity scores standing in for label similarity.
    pub handlers: MatchingHandlers,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            acceptance_threshold: Score::new(600),
            size_tolerance_pct: 50,
            size_slack: 2,
            max_compared_pairs: Some(5_000_000),
            unordered_kinds: BTreeSet::new(),
            handlers: MatchingHandlers::new(),
        }
    }
}

impl MatchingConfig {
    /// Cheap pre-filter: are subtrees of these sizes close enough to compare?
    #[must_use]
    pub fn size_compatible(&self, a: usize, b: usize) -> bool {
        let diff = a.abs_diff(b);
        let larger = a.max(b);
        diff <= self.size_slack
            || diff.saturating_mul(100) <= larger.saturating_mul(usize::from(self.size_tolerance_pct))
    }
}
