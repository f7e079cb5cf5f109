//! Source-level merge pipeline: parse → match → merge.
//!
//! [`merge_sources`] picks a front end for the file (by configuration and
//! extension), parses the three revisions, runs the structural merge, and
//! returns the outcome. Text is rendered back only for line granularity;
//! syntax-granular trees are handed to the caller as-is.

use std::path::Path;

use anyhow::{Context as _, Result};
use arbor_core::{ArtifactTree, Conflict, MergeOutcome, Revision, merge_revisions};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::{ArborConfig, Granularity};
#[cfg(feature = "ast-merge")]
use crate::frontend::TreeSitterFrontEnd;
use crate::frontend::{FrontEnd, LineFrontEnd};

/// Result of merging one file.
#[derive(Debug)]
pub struct SourceMerge {
    /// Name of the front end that parsed the revisions.
    pub front_end: &'static str,
    /// The structural merge result.
    pub outcome: MergeOutcome,
    /// Merged text with conflict markers, for line granularity.
    pub text: Option<String>,
}

impl SourceMerge {
    /// Whether the merge finished without conflicts.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcome.is_clean()
    }

    /// A JSON report of the merge: front end, node count, and conflicts.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn report_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Report<'a> {
            front_end: &'a str,
            clean: bool,
            merged_nodes: usize,
            operations: usize,
            conflicts: &'a [Conflict],
        }

        let report = Report {
            front_end: self.front_end,
            clean: self.is_clean(),
            merged_nodes: self.outcome.tree.len(),
            operations: self.outcome.operations.len(),
            conflicts: &self.outcome.conflicts,
        };
        serde_json::to_string_pretty(&report).context("serializing merge report")
    }
}

/// Choose the front end for `path` under `config`.
///
/// Syntax granularity uses tree-sitter when the extension names a supported
/// language and falls back to lines otherwise.
#[must_use]
pub fn front_end_for(path: &Path, config: &ArborConfig) -> Box<dyn FrontEnd> {
    match config.frontend.granularity {
        Granularity::Line => Box::new(LineFrontEnd),
        Granularity::Syntax => syntax_front_end(path, config),
    }
}

#[cfg(feature = "ast-merge")]
fn syntax_front_end(path: &Path, config: &ArborConfig) -> Box<dyn FrontEnd> {
    match TreeSitterFrontEnd::for_path(path) {
        Some(front_end) => {
            Box::new(front_end.allow_syntax_errors(config.frontend.allow_syntax_errors))
        }
        None => Box::new(LineFrontEnd),
    }
}

#[cfg(not(feature = "ast-merge"))]
fn syntax_front_end(path: &Path, _config: &ArborConfig) -> Box<dyn FrontEnd> {
    warn!(
        path = %path.display(),
        "syntax granularity requested but arbor built without 'ast-merge'; using lines"
    );
    Box::new(LineFrontEnd)
}

/// Merge three versions of the file at `path`.
///
/// # Errors
/// Fails if a revision cannot be parsed or the merge rejects its inputs.
/// Conflicts are not errors; they are reported in the returned outcome.
pub fn merge_sources(
    path: &Path,
    base: &str,
    left: &str,
    right: &str,
    config: &ArborConfig,
) -> Result<SourceMerge> {
    let front_end = front_end_for(path, config);
    let span = info_span!("merge_sources", path = %path.display(), front_end = front_end.name());
    let _guard = span.enter();

    let parse = |source: &str, revision: Revision| -> Result<ArtifactTree> {
        front_end
            .parse(source, revision)
            .with_context(|| format!("parsing {revision} revision of {}", path.display()))
    };
    let base_tree = parse(base, Revision::Base)?;
    let left_tree = parse(left, Revision::Left)?;
    let right_tree = parse(right, Revision::Right)?;

    let mut matching = config.matching_config();
    matching.handlers = front_end.matching_handlers();
    let outcome = merge_revisions(
        &base_tree,
        &left_tree,
        &right_tree,
        &matching,
        &config.merge_config(),
    )
    .with_context(|| format!("merging {}", path.display()))?;

    if !outcome.is_clean() {
        warn!(conflicts = outcome.conflicts.len(), "merge left conflicts");
    }
    info!(merged_nodes = outcome.tree.len(), "merged");

    let text = (front_end.name() == LineFrontEnd.name()).then(|| LineFrontEnd.render(&outcome.tree));
    Ok(SourceMerge {
        front_end: front_end.name(),
        outcome,
        text,
    })
}

/// Read three files and merge them, keyed by the left file's path.
///
/// # Errors
/// Fails if a file cannot be read, plus everything [`merge_sources`] fails on.
pub fn merge_files(
    base: &Path,
    left: &Path,
    right: &Path,
    config: &ArborConfig,
) -> Result<SourceMerge> {
    let read = |path: &Path| {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    };
    merge_sources(left, &read(base)?, &read(left)?, &read(right)?, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_config() -> ArborConfig {
        let mut config = ArborConfig::default();
        config.frontend.granularity = Granularity::Line;
        config
    }

    #[test]
    fn line_granularity_renders_text() {
        let merged = merge_sources(
            Path::new("notes.txt"),
            "a\nb\n",
            "a\nb\nc\n",
            "z\na\nb\n",
            &line_config(),
        )
        .unwrap();
        assert!(merged.is_clean());
        assert_eq!(merged.front_end, "line");
        assert_eq!(merged.text.as_deref(), Some("z\na\nb\nc\n"));
    }

    #[test]
    fn unknown_extension_falls_back_to_lines() {
        let front_end = front_end_for(Path::new("notes.txt"), &ArborConfig::default());
        assert_eq!(front_end.name(), "line");
    }

    #[cfg(feature = "ast-merge")]
    #[test]
    fn known_extension_uses_tree_sitter() {
        let front_end = front_end_for(Path::new("lib.rs"), &ArborConfig::default());
        assert_eq!(front_end.name(), "tree-sitter-rust");
        let front_end = front_end_for(Path::new("lib.rs"), &line_config());
        assert_eq!(front_end.name(), "line");
    }

    #[test]
    fn report_lists_conflicts() {
        let merged = merge_sources(
            Path::new("notes.txt"),
            "a\nb\n",
            "a\nL\nb\n",
            "a\nR\nb\n",
            &line_config(),
        )
        .unwrap();
        let report: serde_json::Value = serde_json::from_str(&merged.report_json().unwrap()).unwrap();
        assert_eq!(report["front_end"], "line");
        assert_eq!(report["clean"], false);
        assert_eq!(report["conflicts"][0]["kind"], "insert_insert");
    }
}
