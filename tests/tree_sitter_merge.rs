//! Integration tests for syntax-granular merges through tree-sitter.
//!
//! Each clean scenario is checked against a parse of the hand-merged source:
//! whitespace is not part of the tree, so equal fingerprints mean the merged
//! tree has exactly the expected structure and tokens.
//!
//! Coverage:
//! - edits to different functions: clean
//! - insertions at different positions: clean, both kept
//! - one side deletes a function the other left alone: clean
//! - both sides change the same expression differently: conflict
//! - a function moved on one side and edited on the other: clean

#![cfg(feature = "ast-merge")]

use std::path::Path;

use arbor::frontend::{FrontEnd, SyntaxLanguage, TreeSitterFrontEnd};
use arbor::{ArborConfig, SourceMerge, merge_sources};
use arbor_core::Revision;

fn merge_rust(base: &str, left: &str, right: &str) -> SourceMerge {
    merge_sources(Path::new("lib.rs"), base, left, right, &ArborConfig::default()).unwrap()
}

fn assert_merged_as(merged: &SourceMerge, expected: &str) {
    let expected = TreeSitterFrontEnd::new(SyntaxLanguage::Rust)
        .parse(expected, Revision::Base)
        .unwrap();
    let tree = &merged.outcome.tree;
    assert_eq!(
        tree.fingerprint(tree.root()),
        expected.fingerprint(expected.root()),
        "merged:   {tree}\nexpected: {expected}"
    );
}

const BASE: &str = "\
fn alpha() {
    let a = 1;
}

fn beta() {
    let b = 2;
}
";

#[test]
fn edits_to_different_functions_merge() {
    let left = "\
fn alpha() {
    let a = 1;
    let extra = a + 1;
}

fn beta() {
    let b = 2;
}
";
    let right = "\
fn alpha() {
    let a = 1;
}

fn beta() {
    let b = 2;
    println!(\"{b}\");
}
";
    let merged = merge_rust(BASE, left, right);
    assert!(merged.is_clean(), "{:?}", merged.outcome.conflicts);
    assert_eq!(merged.front_end, "tree-sitter-rust");
    assert!(merged.text.is_none());
    assert_merged_as(
        &merged,
        "\
fn alpha() {
    let a = 1;
    let extra = a + 1;
}

fn beta() {
    let b = 2;
    println!(\"{b}\");
}
",
    );
}

#[test]
fn insertions_at_different_positions_merge() {
    let left = format!("fn gamma() {{}}\n\n{BASE}");
    let right = format!("{BASE}\nfn delta() {{}}\n");
    let merged = merge_rust(BASE, &left, &right);
    assert!(merged.is_clean(), "{:?}", merged.outcome.conflicts);
    assert_merged_as(&merged, &format!("fn gamma() {{}}\n{BASE}fn delta() {{}}\n"));
}

#[test]
fn deleting_an_untouched_function_is_taken() {
    let left = "\
fn beta() {
    let b = 2;
}
";
    let right = "\
fn alpha() {
    let a = 1;
}

fn beta() {
    let b = 2;
}

fn gamma() {}
";
    let merged = merge_rust(BASE, left, right);
    assert!(merged.is_clean(), "{:?}", merged.outcome.conflicts);
    assert_merged_as(
        &merged,
        "\
fn beta() {
    let b = 2;
}

fn gamma() {}
",
    );
}

#[test]
fn conflicting_edits_to_one_statement_conflict() {
    let left = BASE.replace("let a = 1;", "let a = 10;");
    let right = BASE.replace("let a = 1;", "let a = 20;");
    let merged = merge_rust(BASE, &left, &right);
    assert!(!merged.is_clean());
    for conflict in &merged.outcome.conflicts {
        assert!(conflict.placeholder.index() < merged.outcome.tree.len());
    }
}

#[test]
fn moved_function_keeps_edit_from_other_side() {
    let left = "\
fn beta() {
    let b = 2;
}

fn alpha() {
    let a = 1;
}
";
    let right = BASE.replace("let b = 2;", "let b = 2;\n    let c = b * 2;");
    let merged = merge_rust(BASE, left, &right);
    assert!(merged.is_clean(), "{:?}", merged.outcome.conflicts);
    assert_merged_as(
        &merged,
        "\
fn beta() {
    let b = 2;
    let c = b * 2;
}

fn alpha() {
    let a = 1;
}
",
    );
}

#[test]
fn syntax_errors_fail_the_merge_unless_allowed() {
    let broken = "fn alpha( {\n";
    let err = merge_sources(Path::new("lib.rs"), BASE, broken, BASE, &ArborConfig::default())
        .unwrap_err();
    assert!(format!("{err:#}").contains("parsing left revision"), "{err:#}");

    let mut config = ArborConfig::default();
    config.frontend.allow_syntax_errors = true;
    let merged = merge_sources(Path::new("lib.rs"), BASE, broken, BASE, &config).unwrap();
    assert_eq!(merged.front_end, "tree-sitter-rust");
}
