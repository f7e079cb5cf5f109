use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the four trees in a merge a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    /// The common ancestor.
    Base,
    /// The first derivative ("ours").
    Left,
    /// The second derivative ("theirs").
    Right,
    /// The merge result.
    Merged,
}

impl Revision {
    /// Lowercase name, as used in logs and serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Left => "left",
            Self::Right => "right",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
