//! Merge configuration (`arbor.toml`).
//!
//! Defines the typed configuration for `arbor.toml`: matching thresholds and
//! weights, merge behaviour, and front-end selection. Every field has a
//! default; a missing file means all defaults.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use arbor_core::matching::{MatchingConfig, MatchingHandlers, ScoreWeights};
use arbor_core::{MergeConfig, Score};
use serde::Deserialize;

/// Default file name looked up by [`ArborConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "arbor.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level arbor configuration.
///
/// Parsed from `arbor.toml`. Missing fields use the core defaults.
/// Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArborConfig {
    /// Tree matching settings.
    #[serde(default)]
    pub matching: MatchingSettings,

    /// Merge settings.
    #[serde(default)]
    pub merge: MergeSettings,

    /// Front-end selection.
    #[serde(default)]
    pub frontend: FrontEndSettings,
}

// ---------------------------------------------------------------------------
// MatchingSettings
// ---------------------------------------------------------------------------

/// Matching thresholds and limits.
///
/// ```toml
/// [matching]
/// acceptance_threshold = 600   # per-mille, pairs must score above it
/// size_tolerance_pct = 50
/// size_slack = 2
/// max_compared_pairs = 5000000 # 0 = no ceiling
///
/// [matching.weights]
/// kind = 1
/// label = 2
/// children = 3
/// parent = 1
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingSettings {
    /// Per-mille score a pair must exceed to be matched (0-1000).
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: u16,

    /// Size pre-filter: percentage of the larger subtree.
    #[serde(default = "default_size_tolerance_pct")]
    pub size_tolerance_pct: u16,

    /// Size pre-filter: absolute node slack.
    #[serde(default = "default_size_slack")]
    pub size_slack: usize,

    /// Ceiling on scored candidate pairs. `0` disables the ceiling.
    #[serde(default = "default_max_compared_pairs")]
    pub max_compared_pairs: u64,

    /// Similarity signal weights.
    #[serde(default)]
    pub weights: WeightSettings,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
            size_tolerance_pct: default_size_tolerance_pct(),
            size_slack: default_size_slack(),
            max_compared_pairs: default_max_compared_pairs(),
            weights: WeightSettings::default(),
        }
    }
}

fn default_acceptance_threshold() -> u16 {
    MatchingConfig::default().acceptance_threshold.get()
}

fn default_size_tolerance_pct() -> u16 {
    MatchingConfig::default().size_tolerance_pct
}

fn default_size_slack() -> usize {
    MatchingConfig::default().size_slack
}

fn default_max_compared_pairs() -> u64 {
    MatchingConfig::default().max_compared_pairs.unwrap_or(0)
}

/// Similarity signal weights. A weight of zero switches the signal off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightSettings {
    /// Kind equality.
    #[serde(default = "default_kind_weight")]
    pub kind: u16,
    /// Label or leaf text similarity.
    #[serde(default = "default_label_weight")]
    pub label: u16,
    /// Matched-descendant ratio.
    #[serde(default = "default_children_weight")]
    pub children: u16,
    /// Parents matched to each other.
    #[serde(default = "default_parent_weight")]
    pub parent: u16,
}

impl Default for WeightSettings {
    fn default() -> Self {
        let weights = ScoreWeights::default();
        Self {
            kind: weights.kind,
            label: weights.label,
            children: weights.children,
            parent: weights.parent,
        }
    }
}

fn default_kind_weight() -> u16 {
    ScoreWeights::default().kind
}

fn default_label_weight() -> u16 {
    ScoreWeights::default().label
}

fn default_children_weight() -> u16 {
    ScoreWeights::default().children
}

fn default_parent_weight() -> u16 {
    ScoreWeights::default().parent
}

// ---------------------------------------------------------------------------
// MergeSettings
// ---------------------------------------------------------------------------

/// Merge behaviour settings.
///
/// ```toml
/// [merge]
/// unordered_kinds = ["use_declaration", "import_statement"]
/// match_left_right = true
/// parallel = true
/// max_nodes = 200000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeSettings {
    /// Kinds whose children form an unordered collection.
    #[serde(default)]
    pub unordered_kinds: BTreeSet<String>,

    /// Pair concurrent insertions through a left↔right matching.
    #[serde(default = "default_true")]
    pub match_left_right: bool,

    /// Run matchings and subtree planning on worker threads.
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Refuse inputs with more nodes than this. Omitted means no limit.
    #[serde(default)]
    pub max_nodes: Option<usize>,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            unordered_kinds: BTreeSet::new(),
            match_left_right: true,
            parallel: true,
            max_nodes: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// FrontEndSettings
// ---------------------------------------------------------------------------

/// How source text is turned into artifact trees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One leaf per line under a single `file` root.
    Line,
    /// Concrete syntax tree via tree-sitter, falling back to lines for
    /// unrecognised file types.
    #[default]
    Syntax,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Syntax => write!(f, "syntax"),
        }
    }
}

/// Front-end selection.
///
/// ```toml
/// [frontend]
/// granularity = "syntax"
/// allow_syntax_errors = false
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontEndSettings {
    /// Line or syntax granularity.
    #[serde(default)]
    pub granularity: Granularity,

    /// Accept sources whose parse contains error nodes.
    #[serde(default)]
    pub allow_syntax_errors: bool,
}

// ---------------------------------------------------------------------------
// Conversion into core configs
// ---------------------------------------------------------------------------

impl ArborConfig {
    /// The core matching configuration these settings describe.
    #[must_use]
    pub fn matching_config(&self) -> MatchingConfig {
        let settings = &self.matching;
        MatchingConfig {
            weights: ScoreWeights {
                kind: settings.weights.kind,
                label: settings.weights.label,
                children: settings.weights.children,
                parent: settings.weights.parent,
            },
            acceptance_threshold: Score::new(settings.acceptance_threshold),
            size_tolerance_pct: settings.size_tolerance_pct,
            size_slack: settings.size_slack,
            max_compared_pairs: (settings.max_compared_pairs > 0)
                .then_some(settings.max_compared_pairs),
            unordered_kinds: self.merge.unordered_kinds.clone(),
            handlers: MatchingHandlers::new(),
        }
    }

    /// The core merge configuration these settings describe.
    #[must_use]
    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            unordered_kinds: self.merge.unordered_kinds.clone(),
            match_left_right: self.merge.match_left_right,
            parallel: self.merge.parallel,
            max_nodes: self.merge.max_nodes,
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.matching.acceptance_threshold > Score::PERFECT.get() {
            return Err(format!(
                "matching.acceptance_threshold must be at most {}, got {}",
                Score::PERFECT.get(),
                self.matching.acceptance_threshold
            ));
        }
        if self.matching.size_tolerance_pct > 100 {
            return Err(format!(
                "matching.size_tolerance_pct must be at most 100, got {}",
                self.matching.size_tolerance_pct
            ));
        }
        let weights = self.matching.weights;
        if weights.kind == 0 && weights.label == 0 && weights.children == 0 && weights.parent == 0
        {
            return Err("matching.weights: at least one weight must be non-zero".to_owned());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading an arbor configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl ArborConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields, or
    ///   out-of-range values, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Load `arbor.toml` from `dir`, or defaults if there is none.
    ///
    /// # Errors
    /// As [`ArborConfig::load`].
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or values out of
    /// range.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config.check().map_err(|message| ConfigError {
            path: None,
            message,
        })?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_core_defaults() {
        let cfg = ArborConfig::default();
        assert_eq!(cfg.matching_config(), MatchingConfig::default());
        assert_eq!(cfg.merge_config(), MergeConfig::default());
        assert_eq!(cfg.frontend.granularity, Granularity::Syntax);
        assert!(!cfg.frontend.allow_syntax_errors);
    }

    #[test]
    fn parse_empty_string() {
        let cfg = ArborConfig::parse("").unwrap();
        assert_eq!(cfg, ArborConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[matching]
acceptance_threshold = 750
size_tolerance_pct = 30
size_slack = 4
max_compared_pairs = 0

[matching.weights]
kind = 2
label = 1
children = 5
parent = 0

[merge]
unordered_kinds = ["use_declaration", "import_statement"]
match_left_right = false
parallel = false
max_nodes = 1000

[frontend]
granularity = "line"
allow_syntax_errors = true
"#;
        let cfg = ArborConfig::parse(toml).unwrap();

        let matching = cfg.matching_config();
        assert_eq!(matching.acceptance_threshold, Score::new(750));
        assert_eq!(matching.size_tolerance_pct, 30);
        assert_eq!(matching.size_slack, 4);
        assert_eq!(matching.max_compared_pairs, None);
        assert_eq!(
            matching.weights,
            ScoreWeights {
                kind: 2,
                label: 1,
                children: 5,
                parent: 0,
            }
        );
        assert_eq!(matching.unordered_kinds, cfg.merge.unordered_kinds);

        let merge = cfg.merge_config();
        assert!(merge.unordered_kinds.contains("use_declaration"));
        assert!(merge.unordered_kinds.contains("import_statement"));
        assert!(!merge.match_left_right);
        assert!(!merge.parallel);
        assert_eq!(merge.max_nodes, Some(1000));

        assert_eq!(cfg.frontend.granularity, Granularity::Line);
        assert!(cfg.frontend.allow_syntax_errors);
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let cfg = ArborConfig::parse("[matching.weights]\nlabel = 4\n").unwrap();
        assert_eq!(cfg.matching.weights.label, 4);
        assert_eq!(cfg.matching.weights.children, 3);
        assert_eq!(cfg.matching.acceptance_threshold, 600);
        assert_eq!(cfg.merge, MergeSettings::default());
    }

    #[test]
    fn parse_rejects_unknown_top_level_field() {
        let err = ArborConfig::parse("[workspace]\nbackend = \"copy\"\n").unwrap_err();
        assert!(err.message.contains("unknown field"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_unknown_nested_field() {
        let err = ArborConfig::parse("[merge]\nstrategy = \"ours\"\n").unwrap_err();
        assert!(err.message.contains("unknown field"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_invalid_granularity() {
        let err = ArborConfig::parse("[frontend]\ngranularity = \"word\"\n").unwrap_err();
        assert!(err.message.contains("unknown variant"), "{}", err.message);
    }

    #[test]
    fn parse_includes_line_number_on_error() {
        let toml = "[matching]\nsize_slack = 1\nacceptance_threshold = \"high\"\n";
        let err = ArborConfig::parse(toml).unwrap_err();
        assert!(
            err.message.contains("line"),
            "error should include line number: {}",
            err.message
        );
    }

    #[test]
    fn parse_rejects_threshold_above_perfect() {
        let err = ArborConfig::parse("[matching]\nacceptance_threshold = 1001\n").unwrap_err();
        assert!(err.message.contains("at most 1000"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_all_zero_weights() {
        let toml = "[matching.weights]\nkind = 0\nlabel = 0\nchildren = 0\nparent = 0\n";
        let err = ArborConfig::parse(toml).unwrap_err();
        assert!(err.message.contains("non-zero"), "{}", err.message);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = ArborConfig::load(Path::new("/nonexistent/arbor.toml")).unwrap();
        assert_eq!(cfg, ArborConfig::default());
    }

    #[test]
    fn granularity_display() {
        assert_eq!(Granularity::Line.to_string(), "line");
        assert_eq!(Granularity::Syntax.to_string(), "syntax");
    }

    #[test]
    fn config_error_display_with_and_without_path() {
        let err = ConfigError {
            path: Some(PathBuf::from("/repo/arbor.toml")),
            message: "line 1: bad".to_owned(),
        };
        assert_eq!(err.to_string(), "/repo/arbor.toml: line 1: bad");

        let err = ConfigError {
            path: None,
            message: "bad".to_owned(),
        };
        assert_eq!(err.to_string(), "config error: bad");
    }
}
