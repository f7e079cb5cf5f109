//! Three-way structural merge.
//!
//! The merge runs in two stages:
//!
//! 1. **Plan.** Walk the three trees top-down through a virtual parent above
//!    the roots. At every matched triple decide keep / take-left / take-right /
//!    merge-children / conflict, and lay out the children as anchors (base
//!    children both sides kept) with gaps between them. The result is an
//!    ordered list of [`Operation`]s.
//! 2. **Build.** Apply the operations in order to a fresh node graph and turn
//!    it into the merged [`ArtifactTree`], with one `$conflict` placeholder per
//!    unresolved conflict.
//!
//! The input trees and matchings are never modified.

mod build;
mod conflict;
mod operation;
mod plan;


use std::collections::BTreeSet;
use std::thread::{self, ScopedJoinHandle};

use tracing::{debug, debug_span, info};

use crate::error::{MergeError, TreeError};
use crate::matching::{MatchingConfig, Matchings, match_trees};
use crate::tree::{ArtifactTree, Revision};

pub use build::MergedTreeBuilder;
pub use conflict::{Conflict, ConflictDraft, ConflictKind};
pub use operation::{Operation, TargetPath};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Merge behaviour knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeConfig {
    /// Kinds whose children are an unordered collection (imports, set-like
    /// declarations). Their children never produce ordering conflicts and
    /// concurrent insertions are all kept.
    pub unordered_kinds: BTreeSet<String>,
    /// Compute and use the left↔right matching to pair insertions. When off,
    /// insertions pair only by identical fingerprint.
    pub match_left_right: bool,
    /// Run matchings and independent subtree planning on worker threads.
    pub parallel: bool,
    /// Refuse input trees with more nodes than this.
    pub max_nodes: Option<usize>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            unordered_kinds: BTreeSet::new(),
            match_left_right: true,
            parallel: true,
            max_nodes: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and output
// ---------------------------------------------------------------------------

/// The three input trees, by role.
#[derive(Clone, Copy, Debug)]
pub struct MergeTrees<'a> {
    /// Common ancestor, revision [`Revision::Base`].
    pub base: &'a ArtifactTree,
    /// First derivative, revision [`Revision::Left`].
    pub left: &'a ArtifactTree,
    /// Second derivative, revision [`Revision::Right`].
    pub right: &'a ArtifactTree,
}

impl<'a> MergeTrees<'a> {
    /// The input tree for `revision`, `None` for [`Revision::Merged`].
    #[must_use]
    pub const fn get(&self, revision: Revision) -> Option<&'a ArtifactTree> {
        match revision {
            Revision::Base => Some(self.base),
            Revision::Left => Some(self.left),
            Revision::Right => Some(self.right),
            Revision::Merged => None,
        }
    }

    fn check(&self, config: &MergeConfig) -> Result<(), MergeError> {
        for (tree, expected) in [
            (self.base, Revision::Base),
            (self.left, Revision::Left),
            (self.right, Revision::Right),
        ] {
            if tree.revision() != expected {
                return Err(MergeError::RevisionMismatch {
                    expected,
                    found: tree.revision(),
                });
            }
            if let Some(limit) = config.max_nodes
                && tree.len() > limit
            {
                return Err(TreeError::TooLarge {
                    nodes: tree.len(),
                    limit,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// The matchings a merge is keyed by.
#[derive(Clone, Copy, Debug)]
pub struct MergeMatchings<'a> {
    /// Base (X) to left (Y).
    pub base_left: &'a Matchings,
    /// Base (X) to right (Y).
    pub base_right: &'a Matchings,
    /// Left (X) to right (Y), used to pair concurrent insertions.
    pub left_right: Option<&'a Matchings>,
}

impl MergeMatchings<'_> {
    fn check(&self, trees: &MergeTrees<'_>) -> Result<(), MergeError> {
        self.base_left.fits(trees.base, trees.left)?;
        self.base_right.fits(trees.base, trees.right)?;
        if let Some(left_right) = self.left_right {
            left_right.fits(trees.left, trees.right)?;
        }
        Ok(())
    }
}

/// Result of a merge.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// The merged tree, revision [`Revision::Merged`]. Conflicts appear in it
    /// as `$conflict` placeholders.
    pub tree: ArtifactTree,
    /// Conflicts in placeholder pre-order.
    pub conflicts: Vec<Conflict>,
    /// The operations the tree was built from.
    pub operations: Vec<Operation>,
}

impl MergeOutcome {
    /// Whether the merge finished without conflicts.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Merge three trees given precomputed matchings.
///
/// # Errors
/// [`MergeError::RevisionMismatch`] if a tree is passed in the wrong role,
/// [`MergeError::MatchingsMismatch`] if a matching belongs to other trees, and
/// [`MergeError::Tree`] if a tree exceeds `config.max_nodes`.
pub fn merge(
    trees: MergeTrees<'_>,
    matchings: MergeMatchings<'_>,
    config: &MergeConfig,
) -> Result<MergeOutcome, MergeError> {
    trees.check(config)?;
    matchings.check(&trees)?;

    let span = debug_span!(
        "merge",
        base_nodes = trees.base.len(),
        left_nodes = trees.left.len(),
        right_nodes = trees.right.len(),
    );
    let _guard = span.enter();

    let operations = plan::Planner::new(trees, matchings, config).plan();

    let mut builder = MergedTreeBuilder::new(trees);
    for operation in &operations {
        builder.apply(operation)?;
    }
    let (tree, conflicts) = builder.finish()?;

    for conflict in &conflicts {
        debug!(
            kind = %conflict.kind,
            placeholder = %conflict.placeholder,
            "unresolved conflict"
        );
    }
    info!(
        operations = operations.len(),
        conflicts = conflicts.len(),
        merged_nodes = tree.len(),
        "merge complete"
    );

    Ok(MergeOutcome {
        tree,
        conflicts,
        operations,
    })
}

/// Match and merge three trees.
///
/// Base↔left, base↔right and (unless disabled) left↔right matchings are
/// independent reads of immutable trees; with `config.parallel` they run on
/// scoped threads. Kinds the merge treats as unordered are matched as
/// unordered too.
///
/// # Errors
/// As [`merge`].
pub fn merge_revisions(
    base: &ArtifactTree,
    left: &ArtifactTree,
    right: &ArtifactTree,
    matching: &MatchingConfig,
    config: &MergeConfig,
) -> Result<MergeOutcome, MergeError> {
    let trees = MergeTrees { base, left, right };
    trees.check(config)?;

    let mut matching = matching.clone();
    matching
        .unordered_kinds
        .extend(config.unordered_kinds.iter().cloned());
    let matching = &matching;

    let (base_left, base_right, left_right) = if config.parallel {
        thread::scope(|scope| {
            let base_left = scope.spawn(|| match_trees(base, left, matching));
            let base_right = scope.spawn(|| match_trees(base, right, matching));
            let left_right = config
                .match_left_right
                .then(|| scope.spawn(|| match_trees(left, right, matching)));
            (
                join(base_left),
                join(base_right),
                left_right.map(join),
            )
        })
    } else {
        (
            match_trees(base, left, matching),
            match_trees(base, right, matching),
            config
                .match_left_right
                .then(|| match_trees(left, right, matching)),
        )
    };

    merge(
        trees,
        MergeMatchings {
            base_left: &base_left,
            base_right: &base_right,
            left_right: left_right.as_ref(),
        },
        config,
    )
}

/// Join a scoped worker, re-raising its panic on this thread.
pub(crate) fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}
