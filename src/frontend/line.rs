use arbor_core::tree::{CONFLICT_KIND, NodeGraph};
use arbor_core::{ArtifactTree, NodeId, Revision};

use super::{FrontEnd, FrontEndError};

/// Kind of the root node the line front end produces.
pub const FILE_KIND: &str = "file";
/// Kind of each line leaf.
pub const LINE_KIND: &str = "line";

/// Whole-file front end: a `file` root with one `line` leaf per line.
///
/// Line terminators are not part of the leaf text; [`LineFrontEnd::render`]
/// ends every line with `\n`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineFrontEnd;

impl FrontEnd for LineFrontEnd {
    fn name(&self) -> &'static str {
        "line"
    }

    fn parse(&self, source: &str, revision: Revision) -> Result<ArtifactTree, FrontEndError> {
        let mut graph = NodeGraph::new();
        let root = graph.add_node(FILE_KIND);
        graph.set_root(root);
        for line in source.lines() {
            let leaf = graph.add_leaf(LINE_KIND, line);
            graph.push_child(root, leaf)?;
        }
        Ok(ArtifactTree::from_graph(graph, revision)?)
    }
}

enum Step<'a> {
    Node(NodeId),
    Marker(&'static str),
    Open(&'a str),
}

impl LineFrontEnd {
    /// Render a merged tree as text.
    ///
    /// Leaf values are written one per line in pre-order. Each `$conflict`
    /// placeholder becomes a marker block:
    ///
    /// ```text
    /// <<<<<<< left (insert_insert)
    /// ...left side...
    /// =======
    /// ...right side...
    /// >>>>>>> right
    /// ```
    #[must_use]
    pub fn render(&self, tree: &ArtifactTree) -> String {
        let mut out = String::new();
        let mut stack = vec![Step::Node(tree.root())];

        while let Some(step) = stack.pop() {
            let id = match step {
                Step::Node(id) => id,
                Step::Marker(marker) => {
                    out.push_str(marker);
                    out.push('\n');
                    continue;
                }
                Step::Open(kind) => {
                    out.push_str("<<<<<<< left (");
                    out.push_str(kind);
                    out.push_str(")\n");
                    continue;
                }
            };

            let node = &tree[id];
            if node.kind() == CONFLICT_KIND
                && let &[left, right] = node.children()
            {
                stack.push(Step::Marker(">>>>>>> right"));
                stack.push(Step::Node(right));
                stack.push(Step::Marker("======="));
                stack.push(Step::Node(left));
                stack.push(Step::Open(node.label().unwrap_or("conflict")));
            } else if node.is_leaf() {
                if let Some(value) = node.value() {
                    out.push_str(value);
                    out.push('\n');
                }
            } else {
                stack.extend(node.children().iter().rev().map(|&child| Step::Node(child)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::matching::MatchingConfig;
    use arbor_core::{ConflictKind, MergeConfig, merge_revisions};

    fn merge_text(base: &str, left: &str, right: &str) -> (String, Vec<ConflictKind>) {
        let fe = LineFrontEnd;
        let outcome = merge_revisions(
            &fe.parse(base, Revision::Base).unwrap(),
            &fe.parse(left, Revision::Left).unwrap(),
            &fe.parse(right, Revision::Right).unwrap(),
            &MatchingConfig::default(),
            &MergeConfig::default(),
        )
        .unwrap();
        let kinds = outcome.conflicts.iter().map(|c| c.kind).collect();
        (fe.render(&outcome.tree), kinds)
    }

    #[test]
    fn parse_one_leaf_per_line() {
        let tree = LineFrontEnd.parse("a\nb\n", Revision::Base).unwrap();
        assert_eq!(tree.to_string(), "file(line:a,line:b)");
        assert_eq!(tree.revision(), Revision::Base);
    }

    #[test]
    fn parse_empty_source() {
        let tree = LineFrontEnd.parse("", Revision::Left).unwrap();
        assert_eq!(tree.to_string(), "file");
        assert_eq!(LineFrontEnd.render(&tree), "");
    }

    #[test]
    fn render_terminates_every_line() {
        let tree = LineFrontEnd.parse("a\r\nb", Revision::Base).unwrap();
        assert_eq!(LineFrontEnd.render(&tree), "a\nb\n");
    }

    #[test]
    fn insertions_at_both_ends_merge() {
        let (text, conflicts) = merge_text("a\nb\nc\n", "a\nb\nc\nd\n", "z\na\nb\nc\n");
        assert!(conflicts.is_empty());
        assert_eq!(text, "z\na\nb\nc\nd\n");
    }

    #[test]
    fn edited_line_and_appended_line_merge() {
        let (text, conflicts) = merge_text("a\nb\nc\n", "a\nb2\nc\n", "a\nb\nc\nd\n");
        assert!(conflicts.is_empty());
        assert_eq!(text, "a\nb2\nc\nd\n");
    }

    #[test]
    fn same_gap_insertions_render_as_markers() {
        let (text, conflicts) = merge_text("a\nb\n", "a\nL\nb\n", "a\nR\nb\n");
        assert_eq!(conflicts, [ConflictKind::InsertInsert]);
        assert_eq!(
            text,
            "a\n<<<<<<< left (insert_insert)\nL\n=======\nR\n>>>>>>> right\nb\n"
        );
    }
}
