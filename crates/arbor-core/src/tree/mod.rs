//! Artifact trees: the structural representation of one revision.
//!
//! A front end describes a revision as a [`NodeGraph`] (or the recursive
//! [`NodeSpec`] shorthand). [`ArtifactTree::from_graph`] validates it, assigns
//! pre-order ordinals, and computes per-node fingerprints and subtree sizes.
//! Trees are immutable after construction; the merge engine builds a new
//! tree rather than editing its inputs.

mod artifact;
mod changes;
mod fingerprint;
mod graph;
mod revision;

pub use artifact::{
    Artifact, ArtifactTree, CONFLICT_KIND, CONFLICT_LEFT_KIND, CONFLICT_RIGHT_KIND, EMPTY_KIND,
    NodeId, NodeRef, ROOT_KIND,
};
pub use changes::has_changes;
pub use fingerprint::Fingerprint;
pub use graph::{NodeGraph, NodeSpec, RawId, RawNode};
pub use revision::Revision;
