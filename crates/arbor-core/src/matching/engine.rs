use std::cmp::Reverse;
use std::collections::HashMap;
use std::iter;

use pathfinding::kuhn_munkres::kuhn_munkres;
use pathfinding::matrix::Matrix;
use tracing::{debug, debug_span, warn};

use crate::tree::{ArtifactTree, Fingerprint, NodeId};

use super::config::MatchingConfig;
use super::matchings::Matchings;
use super::score::{Score, bigram_similarity};

/// Compute the matching between `x` and `y`.
///
/// Deterministic: the same trees and configuration always produce the same
/// table. If either tree is the empty artifact the table is empty. If the
/// candidate-pair budget runs out the table is empty and
/// [`is_degraded`](Matchings::is_degraded).
#[must_use]
pub fn match_trees(x: &ArtifactTree, y: &ArtifactTree, config: &MatchingConfig) -> Matchings {
    let span = debug_span!(
        "match_trees",
        x = %x.revision(),
        y = %y.revision(),
        x_nodes = x.len(),
        y_nodes = y.len(),
    );
    let _guard = span.enter();

    if x.is_empty_artifact() || y.is_empty_artifact() {
        debug!("empty artifact, nothing to match");
        return Matchings::new(x, y);
    }

    let mut engine = Engine {
        x,
        y,
        config,
        matchings: Matchings::new(x, y),
        compared: 0,
    };

    engine.match_identical();
    engine.match_roots();
    let outcome = engine
        .align_matched()
        .and_then(|aligned| {
            debug!(aligned, "children aligned");
            engine.match_moved()
        })
        .and_then(|()| engine.align_matched())
        .map(|recovered| debug!(recovered, "children recovered"));

    match outcome {
        Ok(()) => {
            debug!(
                pairs = engine.matchings.len(),
                compared = engine.compared,
                "matching complete"
            );
            engine.matchings
        }
        Err(BudgetExceeded { compared, limit }) => {
            warn!(
                compared,
                limit,
                x = %x.revision(),
                y = %y.revision(),
                "matching budget exceeded, treating every node as unmatched"
            );
            Matchings::degraded(x, y)
        }
    }
}

#[derive(Debug)]
struct BudgetExceeded {
    compared: u64,
    limit: u64,
}

struct Engine<'a> {
    x: &'a ArtifactTree,
    y: &'a ArtifactTree,
    config: &'a MatchingConfig,
    matchings: Matchings,
    compared: u64,
}

impl<'a> Engine<'a> {
    // -- phase 1 ------------------------------------------------------------

    /// Pair structurally identical subtrees, largest first.
    ///
    /// Among several identical candidates prefer one whose parent is matched
    /// to X's parent, then the one at the closest relative position, then the
    /// lowest ordinal. An ambiguous single leaf (`;`, `}`) is only paired
    /// through a matched parent; otherwise it is left to the alignment.
    fn match_identical(&mut self) {
        let mut index: HashMap<Fingerprint, Vec<NodeId>> = HashMap::new();
        for id in self.y.preorder() {
            index.entry(self.y.fingerprint(id)).or_default().push(id);
        }
        let mut x_counts: HashMap<Fingerprint, usize> = HashMap::new();
        for id in self.x.preorder() {
            *x_counts.entry(self.x.fingerprint(id)).or_default() += 1;
        }

        let mut order: Vec<NodeId> = self.x.preorder().collect();
        order.sort_by_key(|id| (Reverse(self.x.tree_size(*id)), *id));

        let mut paired = 0usize;
        for x_id in order {
            if self.matchings.forward(x_id).is_some() {
                continue;
            }
            let fingerprint = self.x.fingerprint(x_id);
            let Some(candidates) = index.get(&fingerprint) else {
                continue;
            };
            let Some((parent_rank, y_id)) = candidates
                .iter()
                .filter(|y_id| self.matchings.backward(**y_id).is_none())
                .map(|y_id| (self.parent_rank(x_id, *y_id), *y_id))
                .min_by_key(|(rank, y_id)| (*rank, self.position_gap(x_id, *y_id), *y_id))
            else {
                continue;
            };

            let ambiguous = candidates.len() > 1
                || x_counts.get(&fingerprint).copied().unwrap_or(0) > 1;
            if self.x.tree_size(x_id) == 1 && ambiguous && parent_rank != 0 {
                continue;
            }

            for (a, b) in self.x.subtree(x_id).zip(self.y.subtree(y_id)) {
                self.matchings.insert(a, b, Score::PERFECT);
            }
            paired += 1;
        }
        debug!(subtrees = paired, "identical subtrees paired");
    }

    /// `0` if the parents of `x_id` and `y_id` are matched to each other (or
    /// both are roots), `1` otherwise.
    fn parent_rank(&self, x_id: NodeId, y_id: NodeId) -> u8 {
        u8::from(!self.parents_matched(x_id, y_id))
    }

    fn parents_matched(&self, x_id: NodeId, y_id: NodeId) -> bool {
        match (self.x.parent(x_id), self.y.parent(y_id)) {
            (None, None) => true,
            (Some(px), Some(py)) => self.matchings.forward(px).is_some_and(|m| m.partner == py),
            _ => false,
        }
    }

    /// Distance between the relative pre-order positions of two nodes,
    /// cross-multiplied to stay in integers.
    fn position_gap(&self, x_id: NodeId, y_id: NodeId) -> usize {
        let a = x_id.index().saturating_mul(self.y.len());
        let b = y_id.index().saturating_mul(self.x.len());
        a.abs_diff(b)
    }

    // -- phase 2 ------------------------------------------------------------

    fn match_roots(&mut self) {
        let (rx, ry) = (self.x.root(), self.y.root());
        if self.x[rx].kind() != self.y[ry].kind() {
            return;
        }
        if self.matchings.forward(rx).is_some() || self.matchings.backward(ry).is_some() {
            return;
        }
        let score = self.score(rx, ry);
        self.matchings.insert(rx, ry, score);
        debug!(%score, "roots paired");
    }

    // -- phases 3 and 5 -----------------------------------------------------

    /// Walk matched pairs top-down and pair their unmatched children. Pairs
    /// committed on the way are visited too, since X is walked in pre-order.
    fn align_matched(&mut self) -> Result<usize, BudgetExceeded> {
        let mut committed = 0;
        for x_parent in self.x.preorder() {
            if let Some(m) = self.matchings.forward(x_parent) {
                committed += self.align_children(x_parent, m.partner)?;
            }
        }
        Ok(committed)
    }

    fn align_children(&mut self, x_parent: NodeId, y_parent: NodeId) -> Result<usize, BudgetExceeded> {
        let (x, y) = (self.x, self.y);
        let xs: &'a [NodeId] = x.children(x_parent);
        let ys: &'a [NodeId] = y.children(y_parent);
        let open_x = xs.iter().any(|id| self.matchings.forward(*id).is_none());
        let open_y = ys.iter().any(|id| self.matchings.backward(*id).is_none());
        if !open_x || !open_y {
            return Ok(0);
        }

        if self.config.unordered_kinds.contains(x[x_parent].kind()) {
            return self.assign(xs, ys);
        }
        let mut committed = 0;
        for (run_x, run_y) in self.runs(xs, ys) {
            committed += self.align_run(&run_x, &run_y)?;
        }
        Ok(committed + self.match_reordered(xs, ys)?)
    }

    /// Unmatched children between consecutive committed sibling pairs that
    /// keep their relative order.
    fn runs(&self, xs: &[NodeId], ys: &[NodeId]) -> Vec<(Vec<NodeId>, Vec<NodeId>)> {
        let position: HashMap<NodeId, usize> =
            ys.iter().enumerate().map(|(j, id)| (*id, j)).collect();
        let committed: Vec<(usize, usize)> = xs
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let partner = self.matchings.forward(*id)?.partner;
                position.get(&partner).map(|j| (i, *j))
            })
            .collect();

        let chain = longest_chain(&committed);
        let mut runs = Vec::with_capacity(chain.len() + 1);
        let (mut i0, mut j0) = (0, 0);
        for (i, j) in chain.into_iter().chain(iter::once((xs.len(), ys.len()))) {
            let run_x = xs[i0..i]
                .iter()
                .copied()
                .filter(|id| self.matchings.forward(*id).is_none())
                .collect();
            let run_y = ys[j0..j]
                .iter()
                .copied()
                .filter(|id| self.matchings.backward(*id).is_none())
                .collect();
            runs.push((run_x, run_y));
            (i0, j0) = (i + 1, j + 1);
        }
        runs
    }

    /// Order-preserving alignment of two runs of unmatched siblings with the
    /// highest summed score.
    fn align_run(&mut self, xs: &[NodeId], ys: &[NodeId]) -> Result<usize, BudgetExceeded> {
        if xs.is_empty() || ys.is_empty() {
            return Ok(0);
        }
        self.charge(xs.len() * ys.len())?;

        let (m, n) = (xs.len(), ys.len());
        let scores = self.score_grid(xs, ys);
        let at = |i: usize, j: usize| i * (n + 1) + j;
        let mut best = vec![0u64; (m + 1) * (n + 1)];
        for i in 1..=m {
            for j in 1..=n {
                let skip = best[at(i - 1, j)].max(best[at(i, j - 1)]);
                let value = scores[(i - 1) * n + j - 1]
                    .map_or(skip, |s| skip.max(best[at(i - 1, j - 1)] + u64::from(s.get())));
                best[at(i, j)] = value;
            }
        }

        // Skipping is preferred over pairing on equal totals, so each X node
        // pairs with the earliest Y node it can.
        let mut pairs = Vec::new();
        let (mut i, mut j) = (m, n);
        while i > 0 && j > 0 {
            let here = best[at(i, j)];
            if here == best[at(i, j - 1)] {
                j -= 1;
            } else if here == best[at(i - 1, j)] {
                i -= 1;
            } else {
                if let Some(score) = scores[(i - 1) * n + j - 1] {
                    pairs.push((score, xs[i - 1], ys[j - 1]));
                }
                i -= 1;
                j -= 1;
            }
        }
        Ok(self.commit(pairs))
    }

    /// Pair inner children the alignment left over although they cross it: a
    /// node moved among its siblings. Single leaves only have their position,
    /// so they are not paired across the alignment.
    fn match_reordered(&mut self, xs: &[NodeId], ys: &[NodeId]) -> Result<usize, BudgetExceeded> {
        let free_x: Vec<NodeId> = xs
            .iter()
            .copied()
            .filter(|id| self.matchings.forward(*id).is_none() && !self.x[*id].is_leaf())
            .collect();
        let free_y: Vec<NodeId> = ys
            .iter()
            .copied()
            .filter(|id| self.matchings.backward(*id).is_none() && !self.y[*id].is_leaf())
            .collect();
        if free_x.is_empty() || free_y.is_empty() {
            return Ok(0);
        }
        self.charge(free_x.len() * free_y.len())?;

        let scores = self.score_grid(&free_x, &free_y);
        let pairs = scores
            .into_iter()
            .enumerate()
            .filter_map(|(k, score)| Some((score?, free_x[k / free_y.len()], free_y[k % free_y.len()])))
            .collect();
        Ok(self.commit(pairs))
    }

    /// Children of an unordered parent: unique labels first, then the
    /// assignment with the highest summed score.
    fn assign(&mut self, xs: &[NodeId], ys: &[NodeId]) -> Result<usize, BudgetExceeded> {
        let mut committed = self.pair_unique_labels(xs, ys);

        let free_x: Vec<NodeId> = xs
            .iter()
            .copied()
            .filter(|id| self.matchings.forward(*id).is_none())
            .collect();
        let free_y: Vec<NodeId> = ys
            .iter()
            .copied()
            .filter(|id| self.matchings.backward(*id).is_none())
            .collect();
        if free_x.is_empty() || free_y.is_empty() {
            return Ok(committed);
        }
        self.charge(free_x.len() * free_y.len())?;

        let (m, n) = (free_x.len(), free_y.len());
        let scores = self.score_grid(&free_x, &free_y);
        // Kuhn–Munkres wants a square matrix; padding cells weigh nothing.
        let size = m.max(n);
        let rows: Vec<Vec<i64>> = (0..size)
            .map(|i| {
                (0..size)
                    .map(|j| {
                        if i < m && j < n {
                            scores[i * n + j].map_or(0, |s| i64::from(s.get()))
                        } else {
                            0
                        }
                    })
                    .collect()
            })
            .collect();
        let Ok(weights) = Matrix::from_rows(rows) else {
            return Ok(committed);
        };
        let (_, columns) = kuhn_munkres(&weights);

        let pairs = columns
            .into_iter()
            .enumerate()
            .filter(|(i, j)| *i < m && *j < n)
            .filter_map(|(i, j)| Some((scores[i * n + j]?, free_x[i], free_y[j])))
            .collect();
        committed += self.commit(pairs);
        Ok(committed)
    }

    /// Pair unmatched children whose kind and label each occur exactly once
    /// among the unmatched children on both sides.
    fn pair_unique_labels(&mut self, xs: &[NodeId], ys: &[NodeId]) -> usize {
        let (x, y) = (self.x, self.y);
        let mut x_keys: HashMap<(&'a str, &'a str), Vec<NodeId>> = HashMap::new();
        for &id in xs {
            if self.matchings.forward(id).is_none()
                && let Some(label) = x[id].label()
            {
                x_keys.entry((x[id].kind(), label)).or_default().push(id);
            }
        }
        let mut y_keys: HashMap<(&'a str, &'a str), Vec<NodeId>> = HashMap::new();
        for &id in ys {
            if self.matchings.backward(id).is_none()
                && let Some(label) = y[id].label()
            {
                y_keys.entry((y[id].kind(), label)).or_default().push(id);
            }
        }

        let mut pairs = Vec::new();
        for (key, x_ids) in &x_keys {
            if let [x_id] = x_ids.as_slice()
                && let Some(&[y_id]) = y_keys.get(key).map(Vec::as_slice)
            {
                pairs.push((self.score(*x_id, y_id), *x_id, y_id));
            }
        }
        self.commit(pairs)
    }

    // -- phase 4 ------------------------------------------------------------

    /// Greedy global pass over the remaining compatible pairs that do not
    /// share matched parents: nodes that moved elsewhere in the tree.
    fn match_moved(&mut self) -> Result<(), BudgetExceeded> {
        let (x, y) = (self.x, self.y);
        let mut buckets: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for id in y.preorder() {
            if self.matchings.backward(id).is_none() {
                buckets.entry(y[id].kind()).or_default().push(id);
            }
        }

        let unmatched: Vec<NodeId> = self
            .x
            .preorder()
            .filter(|id| self.matchings.forward(*id).is_none())
            .collect();
        let total: usize = unmatched
            .iter()
            .map(|id| buckets.get(x[*id].kind()).map_or(0, Vec::len))
            .sum();
        self.charge(total)?;

        let mut pairs = Vec::new();
        for &x_id in &unmatched {
            let Some(candidates) = buckets.get(x[x_id].kind()) else {
                continue;
            };
            for &y_id in candidates {
                if self.parents_matched(x_id, y_id) {
                    continue;
                }
                if let Some(score) = self.acceptable(x_id, y_id) {
                    pairs.push((score, x_id, y_id));
                }
            }
        }

        let committed = self.commit(pairs);
        debug!(committed, "moved pairs committed");
        Ok(())
    }

    // -- shared -------------------------------------------------------------

    /// Scores of every `xs × ys` pair, row-major; `None` where the pair is of
    /// different kinds or not acceptable.
    fn score_grid(&self, xs: &[NodeId], ys: &[NodeId]) -> Vec<Option<Score>> {
        xs.iter()
            .flat_map(|&x_id| {
                ys.iter().map(move |&y_id| {
                    if self.x[x_id].kind() == self.y[y_id].kind() {
                        self.acceptable(x_id, y_id)
                    } else {
                        None
                    }
                })
            })
            .collect()
    }

    /// Score a same-kind pair, `None` if it fails the size filter or does not
    /// clear the threshold.
    fn acceptable(&self, x_id: NodeId, y_id: NodeId) -> Option<Score> {
        if !self
            .config
            .size_compatible(self.x.tree_size(x_id), self.y.tree_size(y_id))
        {
            return None;
        }
        let score = self.score(x_id, y_id);
        (score > self.config.acceptance_threshold).then_some(score)
    }

    /// Commit best-first; ties by X ordinal, then the closest relative
    /// position, then Y ordinal. Returns the number of pairs committed.
    fn commit(&mut self, mut pairs: Vec<(Score, NodeId, NodeId)>) -> usize {
        pairs.sort_unstable_by_key(|(score, x_id, y_id)| {
            (Reverse(*score), *x_id, self.position_gap(*x_id, *y_id), *y_id)
        });
        pairs
            .into_iter()
            .filter(|(score, x_id, y_id)| self.matchings.insert(*x_id, *y_id, *score))
            .count()
    }

    fn charge(&mut self, pairs: usize) -> Result<(), BudgetExceeded> {
        self.compared = self
            .compared
            .saturating_add(u64::try_from(pairs).unwrap_or(u64::MAX));
        match self.config.max_compared_pairs {
            Some(limit) if self.compared > limit => Err(BudgetExceeded {
                compared: self.compared,
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Weighted mean of the applicable signals.
    fn score(&self, x_id: NodeId, y_id: NodeId) -> Score {
        let (a, b) = (&self.x[x_id], &self.y[y_id]);
        let weights = self.config.weights;
        let mut total = 0u64;
        let mut weight = 0u64;

        weight += u64::from(weights.kind);
        if a.kind() == b.kind() {
            total += u64::from(weights.kind) * 1000;
        }

        let handled = if a.kind() == b.kind() {
            self.config
                .handlers
                .get(a.kind())
                .and_then(|handler| handler(self.x, x_id, self.y, y_id))
        } else {
            None
        };
        let label = handled.or_else(|| {
            (a.descriptor().is_some() || b.descriptor().is_some()).then(|| {
                bigram_similarity(
                    a.descriptor().unwrap_or_default(),
                    b.descriptor().unwrap_or_default(),
                )
            })
        });
        if let Some(similarity) = label {
            weight += u64::from(weights.label);
            total += u64::from(weights.label) * u64::from(similarity.get());
        }

        if !a.is_leaf() || !b.is_leaf() {
            weight += u64::from(weights.children);
            total += u64::from(weights.children) * u64::from(self.descendant_dice(x_id, y_id).get());
        }

        weight += u64::from(weights.parent);
        if self.parents_matched(x_id, y_id) {
            total += u64::from(weights.parent) * 1000;
        }

        Score::ratio(total, weight.saturating_mul(1000))
    }

    /// Dice ratio of descendants of `x_id` matched into the subtree of `y_id`.
    fn descendant_dice(&self, x_id: NodeId, y_id: NodeId) -> Score {
        let common = self
            .x
            .subtree(x_id)
            .skip(1)
            .filter_map(|d| self.matchings.forward(d))
            .filter(|m| m.partner != y_id && self.y.contains(y_id, m.partner))
            .count();
        let sizes = self.x.tree_size(x_id) - 1 + self.y.tree_size(y_id) - 1;
        Score::ratio(2 * common as u64, sizes as u64)
    }
}

/// Longest subsequence of `pairs` (ascending in the first index) that also
/// ascends in the second. Ties keep the earliest pairs.
fn longest_chain(pairs: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; pairs.len()];
    for (k, &(_, j)) in pairs.iter().enumerate() {
        let slot = tails.partition_point(|&t| pairs[t].1 < j);
        previous[k] = slot.checked_sub(1).map(|s| tails[s]);
        if slot == tails.len() {
            tails.push(k);
        } else {
            tails[slot] = k;
        }
    }

    let mut chain = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(k) = cursor {
        chain.push(pairs[k]);
        cursor = previous[k];
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{MatchingHandlers, ScoreWeights};
    use crate::tree::{NodeRef, NodeSpec, Revision};

    fn build(spec: NodeSpec, revision: Revision) -> ArtifactTree {
        ArtifactTree::from_graph(spec.into_graph(), revision).unwrap()
    }

    fn function(name: &str, body: &[&str]) -> NodeSpec {
        NodeSpec::node("fn", body.iter().map(|s| NodeSpec::leaf("stmt", *s))).labeled(name)
    }

    fn module(items: Vec<NodeSpec>) -> NodeSpec {
        NodeSpec::node("module", items)
    }

    fn partner(m: &Matchings, x: usize) -> Option<usize> {
        m.forward(NodeId::new(x)).map(|m| m.partner.index())
    }

    #[test]
    fn identical_trees_match_perfectly() {
        let spec = module(vec![
            function("a", &["let x = 1;", "x"]),
            function("b", &["todo!()"]),
        ]);
        let x = build(spec.clone(), Revision::Base);
        let y = build(spec, Revision::Left);
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(m.len(), x.len());
        for (a, b, score) in m.iter() {
            assert_eq!(a, b);
            assert!(score.is_perfect());
        }
    }

    #[test]
    fn moved_subtree_is_found_by_fingerprint() {
        let x = build(
            module(vec![function("a", &["one"]), function("b", &["two"])]),
            Revision::Base,
        );
        let y = build(
            module(vec![function("b", &["two"]), function("a", &["one"])]),
            Revision::Left,
        );
        let m = match_trees(&x, &y, &MatchingConfig::default());
        // x: module, a, one, b, two  /  y: module, b, two, a, one
        assert_eq!(partner(&m, 1), Some(3));
        assert_eq!(partner(&m, 3), Some(1));
        assert_eq!(partner(&m, 0), Some(0));
    }

    #[test]
    fn edited_function_is_matched_by_label_and_children() {
        let x = build(
            module(vec![function("parse", &["open()", "read()", "close()"])]),
            Revision::Base,
        );
        let y = build(
            module(vec![function("parse", &["open()", "read_all()", "close()"])]),
            Revision::Right,
        );
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&m, 1), Some(1));
        assert_eq!(partner(&m, 2), Some(2));
        assert_eq!(partner(&m, 4), Some(4));
        // "read()" vs "read_all()" is similar enough under matched parents.
        assert_eq!(partner(&m, 3), Some(3));
    }

    #[test]
    fn unrelated_nodes_stay_unmatched() {
        let x = build(module(vec![NodeSpec::leaf("stmt", "alpha")]), Revision::Base);
        let y = build(module(vec![NodeSpec::leaf("stmt", "zzz")]), Revision::Left);
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&m, 0), Some(0));
        assert_eq!(partner(&m, 1), None);
    }

    #[test]
    fn different_kinds_never_match() {
        let x = build(module(vec![NodeSpec::leaf("stmt", "same")]), Revision::Base);
        let y = build(module(vec![NodeSpec::leaf("expr", "same")]), Revision::Left);
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&m, 1), None);
    }

    #[test]
    fn roots_of_different_kind_are_not_forced() {
        let x = build(NodeSpec::node("module", [NodeSpec::leaf("a", "1")]), Revision::Base);
        let y = build(NodeSpec::node("script", [NodeSpec::leaf("b", "2")]), Revision::Left);
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert!(m.is_empty());
    }

    #[test]
    fn ambiguous_leaves_follow_their_parents() {
        // Both functions end in the same statement; each must pair with the
        // statement under its own counterpart.
        let x = build(
            module(vec![
                function("a", &["first", "done"]),
                function("b", &["second", "done"]),
            ]),
            Revision::Base,
        );
        let y = build(
            module(vec![
                function("b", &["second", "done"]),
                function("a", &["first!", "done"]),
            ]),
            Revision::Left,
        );
        let m = match_trees(&x, &y, &MatchingConfig::default());
        // x: 0 module, 1 a, 2 first, 3 done, 4 b, 5 second, 6 done
        // y: 0 module, 1 b, 2 second, 3 done, 4 a, 5 first!, 6 done
        assert_eq!(partner(&m, 4), Some(1));
        assert_eq!(partner(&m, 6), Some(3));
        assert_eq!(partner(&m, 1), Some(4));
        assert_eq!(partner(&m, 3), Some(6));
    }

    #[test]
    fn empty_artifact_matches_nothing() {
        let x = ArtifactTree::from_graph(crate::tree::NodeGraph::empty(), Revision::Base).unwrap();
        let y = ArtifactTree::from_graph(crate::tree::NodeGraph::empty(), Revision::Left).unwrap();
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert!(m.is_empty());
        assert!(!m.is_degraded());
    }

    #[test]
    fn exhausted_budget_degrades() {
        let x = build(
            module((0..20).map(|i| NodeSpec::leaf("stmt", format!("a{i}"))).collect()),
            Revision::Base,
        );
        let y = build(
            module((0..20).map(|i| NodeSpec::leaf("stmt", format!("b{i}"))).collect()),
            Revision::Left,
        );
        let config = MatchingConfig {
            max_compared_pairs: Some(10),
            ..MatchingConfig::default()
        };
        let m = match_trees(&x, &y, &config);
        assert!(m.is_degraded());
        assert!(m.is_empty());
        assert!(!m.has_matching(NodeRef::new(Revision::Base, x.root())));
    }

    #[test]
    fn matching_is_deterministic() {
        let x = build(
            module(vec![
                function("a", &["x", "x", "y"]),
                function("a", &["x", "y"]),
                NodeSpec::leaf("stmt", "x"),
            ]),
            Revision::Base,
        );
        let y = build(
            module(vec![
                function("a", &["x", "y", "x"]),
                NodeSpec::leaf("stmt", "x"),
                function("a", &["y", "x"]),
            ]),
            Revision::Left,
        );
        let config = MatchingConfig::default();
        let first = match_trees(&x, &y, &config);
        for _ in 0..5 {
            assert_eq!(match_trees(&x, &y, &config), first);
        }
    }

    fn lines(values: &[&str]) -> NodeSpec {
        NodeSpec::node("file", values.iter().map(|v| NodeSpec::leaf("line", *v)))
    }

    #[test]
    fn repeated_leaves_align_in_order() {
        // x: 0 file, 1 a, 2 }, 3 b, 4 }
        // y: 0 file, 1 x, 2 }, 3 a, 4 }, 5 b, 6 }
        let x = build(lines(&["a", "}", "b", "}"]), Revision::Base);
        let y = build(lines(&["x", "}", "a", "}", "b", "}"]), Revision::Left);
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&m, 1), Some(3));
        assert_eq!(partner(&m, 2), Some(4));
        assert_eq!(partner(&m, 3), Some(5));
        assert_eq!(partner(&m, 4), Some(6));
        assert!(m.backward(NodeId::new(2)).is_none());
    }

    #[test]
    fn repeated_leaves_pair_with_the_earliest_candidate() {
        let x = build(lines(&["a", "}"]), Revision::Base);
        let y = build(lines(&["a", "}", "}"]), Revision::Left);
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&m, 2), Some(2));
        assert!(m.backward(NodeId::new(3)).is_none());
    }

    #[test]
    fn ambiguous_tokens_stay_inside_their_function() {
        let body = |name: &str, stmts: &[&str]| {
            let mut children = vec![NodeSpec::leaf("tok", "{")];
            children.extend(stmts.iter().map(|s| NodeSpec::leaf("stmt", *s)));
            children.push(NodeSpec::leaf("tok", "}"));
            NodeSpec::node("fn", children).labeled(name)
        };
        // x: 0 module, 1 a, 2 {, 3 one, 4 two, 5 }, 6 b, 7 {, 8 three, 9 }
        // y: 0 module, 1 c, 2 {, 3 zero, 4 }, 5 a, 6 {, 7 one, 8 two(2), 9 },
        //    10 b, 11 {, 12 three, 13 }
        let x = build(
            module(vec![
                body("a", &["one();", "two();"]),
                body("b", &["three();"]),
            ]),
            Revision::Base,
        );
        let y = build(
            module(vec![
                body("c", &["zero();"]),
                body("a", &["one();", "two(2);"]),
                body("b", &["three();"]),
            ]),
            Revision::Right,
        );
        let m = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&m, 1), Some(5));
        assert_eq!(partner(&m, 2), Some(6));
        assert_eq!(partner(&m, 4), Some(8));
        assert_eq!(partner(&m, 5), Some(9));
        assert!(m.backward(NodeId::new(1)).is_none());
        assert!(m.backward(NodeId::new(2)).is_none());
    }

    #[test]
    fn unordered_children_are_assigned_by_total_score() {
        let x = build(
            NodeSpec::node(
                "imports",
                [NodeSpec::leaf("use", "alpha_beta"), NodeSpec::leaf("use", "gamma_delta")],
            ),
            Revision::Base,
        );
        let y = build(
            NodeSpec::node(
                "imports",
                [NodeSpec::leaf("use", "gamma_delta2"), NodeSpec::leaf("use", "alpha_beta2")],
            ),
            Revision::Left,
        );

        // In order, the swapped pairs cross: only one of them survives.
        let ordered = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&ordered, 1), None);
        assert_eq!(partner(&ordered, 2), Some(1));

        let config = MatchingConfig {
            unordered_kinds: ["imports".to_owned()].into(),
            ..MatchingConfig::default()
        };
        let unordered = match_trees(&x, &y, &config);
        assert_eq!(partner(&unordered, 1), Some(2));
        assert_eq!(partner(&unordered, 2), Some(1));
    }

    #[test]
    fn unique_labels_pair_in_unordered_parents() {
        let field = |name: &str, ty: &str| {
            NodeSpec::node("field", [NodeSpec::leaf("ty", ty)]).labeled(name)
        };
        // x: 0 record, 1 id, 2 u8, 3 name, 4 String
        // y: 0 record, 1 name, 2 Vec<u8>, 3 id, 4 u64
        let x = build(
            NodeSpec::node("record", [field("id", "u8"), field("name", "String")]),
            Revision::Base,
        );
        let y = build(
            NodeSpec::node("record", [field("name", "Vec<u8>"), field("id", "u64")]),
            Revision::Right,
        );

        let ordered = match_trees(&x, &y, &MatchingConfig::default());
        assert_eq!(partner(&ordered, 1), None);

        let config = MatchingConfig {
            unordered_kinds: ["record".to_owned()].into(),
            ..MatchingConfig::default()
        };
        let unordered = match_trees(&x, &y, &config);
        assert_eq!(partner(&unordered, 1), Some(3));
        assert_eq!(partner(&unordered, 3), Some(1));
    }

    fn same_signature(x: &ArtifactTree, x_id: NodeId, y: &ArtifactTree, y_id: NodeId) -> Option<Score> {
        let signature = |tree: &ArtifactTree, id: NodeId| {
            let first = *tree.children(id).first()?;
            tree[first].value().map(str::to_owned)
        };
        let same = signature(x, x_id)? == signature(y, y_id)?;
        Some(if same { Score::PERFECT } else { Score::ZERO })
    }

    #[test]
    fn kind_handlers_tell_overloads_apart() {
        let method = |sig: &str, body: &str| {
            NodeSpec::node(
                "method",
                [NodeSpec::leaf("sig", sig), NodeSpec::leaf("body", body)],
            )
            .labeled("f")
        };
        // x: 0 class, 1 f(int), 2 sig, 3 body, 4 f(str), 5 sig, 6 body
        // y: 0 class, 1 f(str), 2 sig, 3 body, 4 f(int), 5 sig, 6 body
        let x = build(
            NodeSpec::node("class", [method("(int)", "return 1"), method("(str)", "return 2")]),
            Revision::Base,
        );
        let y = build(
            NodeSpec::node("class", [method("(str)", "return 20"), method("(int)", "return 10")]),
            Revision::Left,
        );
        let label_only = MatchingConfig {
            weights: ScoreWeights {
                children: 0,
                ..ScoreWeights::default()
            },
            ..MatchingConfig::default()
        };

        // Same kind and name: position decides.
        let m = match_trees(&x, &y, &label_only);
        assert_eq!(partner(&m, 1), Some(1));

        let mut handlers = MatchingHandlers::new();
        handlers.register("method", same_signature);
        let config = MatchingConfig {
            handlers,
            ..label_only
        };
        let m = match_trees(&x, &y, &config);
        assert_eq!(partner(&m, 1), Some(4));
        assert_eq!(partner(&m, 4), Some(1));
    }

    #[test]
    fn longest_chain_keeps_the_ordered_pairs() {
        assert_eq!(
            longest_chain(&[(0, 2), (1, 0), (2, 1), (3, 3)]),
            [(1, 0), (2, 1), (3, 3)]
        );
        assert!(longest_chain(&[]).is_empty());
    }
}
