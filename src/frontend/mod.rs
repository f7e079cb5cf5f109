//! Front ends: turning source text into artifact trees.
//!
//! A front end owns the language-specific half of the pipeline. It produces a
//! [`NodeGraph`](arbor_core::NodeGraph) and hands it to
//! [`ArtifactTree::from_graph`]; the merge core never sees source text.
//!
//! Two front ends ship with the crate:
//! - [`LineFrontEnd`]: one `line` leaf per line under a `file` root. Works for
//!   any text and renders merged trees back with conflict markers.
//! - [`TreeSitterFrontEnd`] (feature `ast-merge`): the concrete syntax tree of
//!   a Rust, Python, TypeScript, JavaScript, or Go source file.

mod line;
#[cfg(feature = "ast-merge")]
mod syntax;

use std::fmt;

use arbor_core::matching::MatchingHandlers;
use arbor_core::{ArtifactTree, Revision, TreeError};

pub use line::{FILE_KIND, LINE_KIND, LineFrontEnd};
#[cfg(feature = "ast-merge")]
pub use syntax::{SyntaxLanguage, TreeSitterFrontEnd};

/// Builds the artifact tree of one revision from its source text.
pub trait FrontEnd {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Parse `source` into the tree of `revision`.
    ///
    /// # Errors
    /// Returns [`FrontEndError`] if the source cannot be represented.
    fn parse(&self, source: &str, revision: Revision) -> Result<ArtifactTree, FrontEndError>;

    /// Identity handlers for the node kinds this front end produces.
    fn matching_handlers(&self) -> MatchingHandlers {
        MatchingHandlers::new()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from front ends.
#[derive(Debug)]
pub enum FrontEndError {
    /// Failed to set up the parser.
    ParserSetup(String),
    /// The parser gave up on the input.
    ParseFailed,
    /// The source has a syntax error and error recovery is not allowed.
    Syntax {
        /// 1-based line of the first error.
        line: usize,
        /// 1-based column of the first error.
        column: usize,
        /// Kind of the offending node (`ERROR` or the missing token).
        node: String,
    },
    /// The produced node graph was rejected.
    Tree(TreeError),
}

impl fmt::Display for FrontEndError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParserSetup(msg) => write!(f, "parser setup failed: {msg}"),
            Self::ParseFailed => write!(f, "parser failed to produce a tree"),
            Self::Syntax { line, column, node } => {
                write!(f, "syntax error at {line}:{column} ({node})")
            }
            Self::Tree(e) => write!(f, "invalid artifact tree: {e}"),
        }
    }
}

impl std::error::Error for FrontEndError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TreeError> for FrontEndError {
    fn from(e: TreeError) -> Self {
        Self::Tree(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FrontEndError::Syntax {
            line: 3,
            column: 7,
            node: "ERROR".to_owned(),
        };
        assert_eq!(err.to_string(), "syntax error at 3:7 (ERROR)");
        assert_eq!(
            FrontEndError::from(TreeError::MissingRoot).to_string(),
            format!("invalid artifact tree: {}", TreeError::MissingRoot)
        );
    }
}
