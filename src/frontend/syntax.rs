//! Syntax-granular front end using tree-sitter.
//!
//! The artifact tree mirrors the concrete syntax tree node for node:
//! - every tree-sitter node becomes an artifact of the same kind;
//! - leaves (tokens, including anonymous punctuation and keywords) carry
//!   their source text as the value;
//! - inner nodes with an identifier field (`name`, or `type` for Rust `impl`
//!   blocks) are labelled with that identifier's text.
//!
//! Labels are what let the matcher follow a renamed-in-place body or a moved
//! function: same kind, same label, similar children.

use std::fmt;
use std::path::Path;

use arbor_core::matching::{MatchingHandlers, bigram_similarity};
use arbor_core::tree::{NodeGraph, RawId};
use arbor_core::{ArtifactTree, NodeId, Revision, Score};
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use super::{FrontEnd, FrontEndError};

// ---------------------------------------------------------------------------
// Language detection
// ---------------------------------------------------------------------------

/// Languages the syntax front end can parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyntaxLanguage {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
}

impl SyntaxLanguage {
    /// Detect language from file extension.
    ///
    /// Returns `None` for unsupported or unrecognized extensions.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "go" => Some(Self::Go),
            _ => None,
        }
    }

    fn tree_sitter_language(self) -> Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Field holding a node's identifier.
    fn name_field(self, node_kind: &str) -> &'static str {
        match (self, node_kind) {
            (Self::Rust, "impl_item") => "type",
            _ => "name",
        }
    }

    /// Kinds whose identity is a name plus a parameter list.
    const fn callable_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["function_item", "function_signature_item"],
            Self::Python => &["function_definition"],
            Self::TypeScript | Self::JavaScript => &[
                "function_declaration",
                "method_definition",
                "function_signature",
                "method_signature",
            ],
            Self::Go => &["function_declaration", "method_declaration"],
        }
    }
}

impl fmt::Display for SyntaxLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rust => write!(f, "rust"),
            Self::Python => write!(f, "python"),
            Self::TypeScript => write!(f, "typescript"),
            Self::JavaScript => write!(f, "javascript"),
            Self::Go => write!(f, "go"),
        }
    }
}

// ---------------------------------------------------------------------------
// Front end
// ---------------------------------------------------------------------------

/// Concrete-syntax-tree front end for one language.
#[derive(Clone, Copy, Debug)]
pub struct TreeSitterFrontEnd {
    language: SyntaxLanguage,
    allow_syntax_errors: bool,
}

impl TreeSitterFrontEnd {
    /// A front end that rejects sources with syntax errors.
    #[must_use]
    pub const fn new(language: SyntaxLanguage) -> Self {
        Self {
            language,
            allow_syntax_errors: false,
        }
    }

    /// A front end for the language of `path`, if recognised.
    #[must_use]
    pub fn for_path(path: &Path) -> Option<Self> {
        SyntaxLanguage::from_path(path).map(Self::new)
    }

    /// Keep `ERROR` and missing-token nodes in the tree instead of failing.
    #[must_use]
    pub const fn allow_syntax_errors(mut self, allow: bool) -> Self {
        self.allow_syntax_errors = allow;
        self
    }

    /// The language this front end parses.
    #[must_use]
    pub const fn language(&self) -> SyntaxLanguage {
        self.language
    }

    fn lower(&self, root: Node<'_>, source: &str) -> Result<NodeGraph, FrontEndError> {
        let mut graph = NodeGraph::new();
        let mut stack: Vec<(Node<'_>, Option<RawId>)> = vec![(root, None)];
        let mut cursor = root.walk();

        while let Some((node, parent)) = stack.pop() {
            let text = source.get(node.byte_range()).unwrap_or_default();
            let id = if node.child_count() == 0 {
                graph.add_leaf(node.kind(), text)
            } else {
                let id = graph.add_node(node.kind());
                let field = self.language.name_field(node.kind());
                if let Some(name) = node.child_by_field_name(field)
                    && let Some(label) = source.get(name.byte_range())
                {
                    graph.set_label(id, label);
                }
                id
            };
            match parent {
                Some(parent) => graph.push_child(parent, id)?,
                None => graph.set_root(id),
            }

            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }
        Ok(graph)
    }
}

impl FrontEnd for TreeSitterFrontEnd {
    fn name(&self) -> &'static str {
        match self.language {
            SyntaxLanguage::Rust => "tree-sitter-rust",
            SyntaxLanguage::Python => "tree-sitter-python",
            SyntaxLanguage::TypeScript => "tree-sitter-typescript",
            SyntaxLanguage::JavaScript => "tree-sitter-javascript",
            SyntaxLanguage::Go => "tree-sitter-go",
        }
    }

    fn parse(&self, source: &str, revision: Revision) -> Result<ArtifactTree, FrontEndError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language.tree_sitter_language())
            .map_err(|e| FrontEndError::ParserSetup(format!("{e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or(FrontEndError::ParseFailed)?;
        let root = tree.root_node();

        if root.has_error() {
            if !self.allow_syntax_errors {
                return Err(first_error(root));
            }
            debug!(language = %self.language, %revision, "keeping syntax errors");
        }

        let graph = self.lower(root, source)?;
        Ok(ArtifactTree::from_graph(graph, revision)?)
    }

    fn matching_handlers(&self) -> MatchingHandlers {
        let mut handlers = MatchingHandlers::new();
        for kind in self.language.callable_kinds() {
            handlers.register(*kind, signature_similarity);
        }
        handlers
    }
}

const PARAMETER_KINDS: [&str; 3] = ["parameters", "formal_parameters", "parameter_list"];

/// Name and parameter tokens of a callable, e.g. `f(a:u8)`.
fn signature(tree: &ArtifactTree, id: NodeId) -> Option<String> {
    let mut signature = tree[id].label()?.to_owned();
    for &child in tree.children(id) {
        if !PARAMETER_KINDS.contains(&tree[child].kind()) {
            continue;
        }
        for token in tree.subtree(child) {
            if let Some(text) = tree[token].value() {
                signature.push_str(text);
            }
        }
    }
    Some(signature)
}

/// Overloads share a name; their parameter lists tell them apart.
fn signature_similarity(x: &ArtifactTree, x_id: NodeId, y: &ArtifactTree, y_id: NodeId) -> Option<Score> {
    Some(bigram_similarity(&signature(x, x_id)?, &signature(y, y_id)?))
}

/// Locate the first `ERROR` or missing node in pre-order.
fn first_error(root: Node<'_>) -> FrontEndError {
    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let point = node.start_position();
            return FrontEndError::Syntax {
                line: point.row + 1,
                column: point.column + 1,
                node: node.kind().to_owned(),
            };
        }
        if node.has_error() {
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    let point = root.start_position();
    FrontEndError::Syntax {
        line: point.row + 1,
        column: point.column + 1,
        node: root.kind().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::tree::ROOT_KIND;

    fn parse_rust(source: &str) -> ArtifactTree {
        TreeSitterFrontEnd::new(SyntaxLanguage::Rust)
            .parse(source, Revision::Base)
            .unwrap()
    }

    #[test]
    fn detects_language_from_extension() {
        assert_eq!(
            SyntaxLanguage::from_path(Path::new("src/lib.rs")),
            Some(SyntaxLanguage::Rust)
        );
        assert_eq!(
            SyntaxLanguage::from_path(Path::new("app.tsx")),
            Some(SyntaxLanguage::TypeScript)
        );
        assert_eq!(
            SyntaxLanguage::from_path(Path::new("x.mjs")),
            Some(SyntaxLanguage::JavaScript)
        );
        assert_eq!(SyntaxLanguage::from_path(Path::new("README.md")), None);
        assert_eq!(SyntaxLanguage::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn root_is_source_file() {
        let tree = parse_rust("fn a() {}\n");
        assert_eq!(tree[tree.root()].kind(), "source_file");
        assert_ne!(tree[tree.root()].kind(), ROOT_KIND);
    }

    #[test]
    fn functions_are_labelled_by_name() {
        let tree = parse_rust("fn alpha() {}\nfn beta() { let x = 1; }\n");
        let root = tree.root();
        let labels: Vec<_> = tree
            .children(root)
            .iter()
            .map(|&id| (tree[id].kind(), tree[id].label()))
            .collect();
        assert_eq!(
            labels,
            [
                ("function_item", Some("alpha")),
                ("function_item", Some("beta")),
            ]
        );
    }

    #[test]
    fn leaves_carry_token_text() {
        let tree = parse_rust("fn a() {}\n");
        let tokens: Vec<_> = tree
            .iter()
            .filter(|node| node.is_leaf())
            .filter_map(|node| node.value())
            .collect();
        assert_eq!(tokens, ["fn", "a", "(", ")", "{", "}"]);
    }

    #[test]
    fn impl_blocks_are_labelled_by_type() {
        let tree = parse_rust("impl Point {}\n");
        let item = tree.children(tree.root())[0];
        assert_eq!(tree[item].kind(), "impl_item");
        assert_eq!(tree[item].label(), Some("Point"));
    }

    #[test]
    fn syntax_errors_are_rejected_by_default() {
        let err = TreeSitterFrontEnd::new(SyntaxLanguage::Rust)
            .parse("fn a( {}\n", Revision::Left)
            .unwrap_err();
        assert!(matches!(err, FrontEndError::Syntax { .. }), "{err}");
    }

    #[test]
    fn syntax_errors_can_be_kept() {
        let tree = TreeSitterFrontEnd::new(SyntaxLanguage::Rust)
            .allow_syntax_errors(true)
            .parse("fn a( {}\n", Revision::Left)
            .unwrap();
        assert_eq!(tree.revision(), Revision::Left);
        assert!(tree.len() > 1);
    }

    #[test]
    fn callables_are_identified_by_signature() {
        let front_end = TreeSitterFrontEnd::new(SyntaxLanguage::Rust);
        let handlers = front_end.matching_handlers();
        assert_eq!(
            handlers.kinds().collect::<Vec<_>>(),
            ["function_item", "function_signature_item"]
        );
        let handler = handlers.get("function_item").unwrap();

        let x = parse_rust("fn f(a: u8) {}\n");
        let same = parse_rust("fn f(a: u8) { a; }\n");
        let other = parse_rust("fn f(b: String) {}\n");
        let item = |tree: &ArtifactTree| tree.children(tree.root())[0];

        let exact = handler(&x, item(&x), &same, item(&same)).unwrap();
        let overload = handler(&x, item(&x), &other, item(&other)).unwrap();
        assert!(exact.is_perfect());
        assert!(overload < exact);
        assert_eq!(signature(&x, item(&x)).as_deref(), Some("f(a:u8)"));
    }

    #[test]
    fn python_classes_are_labelled() {
        let tree = TreeSitterFrontEnd::new(SyntaxLanguage::Python)
            .parse("class Point:\n    pass\n", Revision::Base)
            .unwrap();
        let class = tree.children(tree.root())[0];
        assert_eq!(tree[class].kind(), "class_definition");
        assert_eq!(tree[class].label(), Some("Point"));
    }
}
