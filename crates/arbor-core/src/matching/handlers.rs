use std::collections::BTreeMap;
use std::fmt;

use crate::tree::{ArtifactTree, NodeId};

use super::score::Score;

/// Identity score for two nodes of the same kind.
///
/// Replaces label similarity in the matching score when it returns `Some`.
/// Front ends register one per kind where the label alone does not tell
/// nodes apart, such as overloaded methods sharing a name.
pub type MatchingHandler =
    fn(x: &ArtifactTree, x_id: NodeId, y: &ArtifactTree, y_id: NodeId) -> Option<Score>;

/// Per-kind [`MatchingHandler`] registry.
#[derive(Clone, Default)]
pub struct MatchingHandlers {
    handlers: BTreeMap<String, MatchingHandler>,
}

impl MatchingHandlers {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `handler` for nodes of `kind`, replacing any earlier one.
    pub fn register(&mut self, kind: impl Into<String>, handler: MatchingHandler) {
        self.handlers.insert(kind.into(), handler);
    }

    /// The handler for `kind`.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<MatchingHandler> {
        self.handlers.get(kind).copied()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for MatchingHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

// Function pointers have no reliable identity; registries compare by kind.
impl PartialEq for MatchingHandlers {
    fn eq(&self, other: &Self) -> bool {
        self.kinds().eq(other.kinds())
    }
}

impl Eq for MatchingHandlers {}
