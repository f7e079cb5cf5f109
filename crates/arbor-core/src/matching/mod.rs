//! Matching engine: a scored, injective correspondence between two trees.
//!
//! [`match_trees`] runs five phases over a pair of trees:
//!
//! 1. **Identical subtrees.** Fingerprint index over Y, X subtrees visited
//!    largest first. Whole subtrees are paired node by node at
//!    [`Score::PERFECT`].
//! 2. **Roots.** Roots of the same kind are paired.
//! 3. **Children.** Top-down over matched pairs. Ordered children are aligned
//!    between the already committed siblings that keep their order, with a
//!    dynamic program that maximises the summed score and never crosses.
//!    Children of an unordered kind are paired by unique label, then by
//!    optimal assignment (Kuhn–Munkres).
//! 4. **Moves.** Every remaining same-kind, size-compatible pair whose parents
//!    are not matched to each other is scored; pairs above the acceptance
//!    threshold are committed greedily, best score first, ties by X ordinal,
//!    then by relative position, then by Y ordinal.
//! 5. **Recovery.** Phase 3 again, for nodes whose score only clears the bar
//!    once their descendants are matched.
//!
//! The result lives in a [`Matchings`] side table; the trees themselves are
//! never touched.

mod config;
mod engine;
mod handlers;
mod matchings;
mod score;

pub use config::{MatchingConfig, ScoreWeights};
pub use engine::match_trees;
pub use handlers::{MatchingHandler, MatchingHandlers};
pub use matchings::{Match, Matchings};
pub use score::{Score, bigram_similarity};
