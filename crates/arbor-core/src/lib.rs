//! Core domain logic for arbor: structural three-way merge.
//!
//! The crate is split the way the merge pipeline runs:
//!
//! - [`tree`]: the artifact tree built from a front end's [`tree::NodeGraph`],
//!   with pre-order ordinals, content fingerprints, and change detection.
//! - [`matching`]: scored, injective correspondence between two trees.
//! - [`merge`]: the three-way decision table, operation planning, and the
//!   merged tree with its conflict records.
//!
//! Parsing source text, rendering merged trees back to text, and file I/O are
//! the caller's business. The root `arbor` crate ships front ends and a driver.

pub mod error;
pub mod matching;
pub mod merge;
pub mod tree;

pub use error::{MergeError, TreeError};
pub use matching::{MatchingConfig, Matchings, Score, match_trees};
pub use merge::{
    Conflict, ConflictKind, MergeConfig, MergeMatchings, MergeOutcome, MergeTrees, Operation,
    TargetPath, merge, merge_revisions,
};
pub use tree::{ArtifactTree, NodeGraph, NodeId, NodeRef, NodeSpec, Revision};
