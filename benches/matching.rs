//! Matching and merge benchmarks.
//!
//! Measures tree matching and full three-way merges on synthetic "module"
//! trees: `n` functions of a few statements each, with a handful of edits
//! spread across the left and right revisions.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench matching
//! # With a custom filter:
//! cargo bench --bench matching -- merge
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use arbor_core::matching::{MatchingConfig, match_trees};
use arbor_core::{ArtifactTree, MergeConfig, NodeSpec, Revision, merge_revisions};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn function(index: usize, edit: Option<&str>) -> NodeSpec {
    let mut body: Vec<NodeSpec> = (0..4)
        .map(|line| NodeSpec::leaf("stmt", format!("let v{line} = f{index}({line});")))
        .collect();
    if let Some(edit) = edit {
        body.push(NodeSpec::leaf("stmt", format!("{edit}({index});")));
    }
    NodeSpec::node("fn", body).labeled(format!("f{index}"))
}

/// A module of `n` functions; every `stride`-th function gets an extra
/// statement tagged `edit`, starting at `offset`.
fn module(n: usize, edit: Option<(&str, usize, usize)>) -> NodeSpec {
    NodeSpec::node(
        "module",
        (0..n).map(|i| {
            let tag = edit.and_then(|(tag, stride, offset)| (i % stride == offset).then_some(tag));
            function(i, tag)
        }),
    )
}

fn tree(spec: NodeSpec, revision: Revision) -> ArtifactTree {
    ArtifactTree::from_graph(spec.into_graph(), revision).expect("valid tree")
}

fn revisions(n: usize) -> (ArtifactTree, ArtifactTree, ArtifactTree) {
    (
        tree(module(n, None), Revision::Base),
        tree(module(n, Some(("left_edit", 10, 0))), Revision::Left),
        tree(module(n, Some(("right_edit", 10, 5))), Revision::Right),
    )
}

const SIZES: [usize; 3] = [10, 100, 500];

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_match_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("match/identical");
    for n in SIZES {
        let x = tree(module(n, None), Revision::Base);
        let y = tree(module(n, None), Revision::Left);
        group.throughput(Throughput::Elements(x.len() as u64));
        group.bench_with_input(BenchmarkId::new("functions", n), &n, |b, _| {
            b.iter(|| match_trees(&x, &y, &MatchingConfig::default()));
        });
    }
    group.finish();
}

fn bench_match_edited(c: &mut Criterion) {
    let mut group = c.benchmark_group("match/edited");
    for n in SIZES {
        let (base, left, _) = revisions(n);
        group.throughput(Throughput::Elements(base.len() as u64));
        group.bench_with_input(BenchmarkId::new("functions", n), &n, |b, _| {
            b.iter(|| match_trees(&base, &left, &MatchingConfig::default()));
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for n in SIZES {
        let (base, left, right) = revisions(n);
        group.throughput(Throughput::Elements(base.len() as u64));
        for (label, parallel) in [("parallel", true), ("sequential", false)] {
            let config = MergeConfig {
                parallel,
                ..MergeConfig::default()
            };
            group.bench_with_input(BenchmarkId::new(label, n), &n, |b, _| {
                b.iter(|| {
                    merge_revisions(&base, &left, &right, &MatchingConfig::default(), &config)
                        .expect("merge")
                });
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_match_identical,
    bench_match_edited,
    bench_merge
);
criterion_main!(benches);
