//! Binary CART decision tree with Gini splits.
//!
//! Nodes live in a flat arena; a split sends rows with
//! `row[feature] <= threshold` to `left`.

use rand::prelude::*;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One node of a fitted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node holding the fraction of positive training rows
    Leaf {
        /// Positive-class fraction
        probability: f64,
        /// Training rows that reached the leaf
        samples: usize,
    },
    /// Internal threshold test
    Split {
        /// Feature column index
        feature: usize,
        /// Rows with a value at or below this go left
        threshold: f64,
        /// Arena index of the left child
        left: usize,
        /// Arena index of the right child
        right: usize,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0
    pub max_depth: usize,
    /// Nodes with fewer rows become leaves
    pub min_samples_split: usize,
    /// Candidate features drawn per split
    pub max_features: usize,
}

/// A fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Gini impurity of a node with `positives` out of `total` rows
fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [u8],
    params: TreeParams,
    rng: StdRng,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, sample: &[usize], depth: usize) -> usize {
        let total = sample.len();
        let positives = sample.iter().filter(|&&i| self.labels[i] == 1).count();
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            probability: if total == 0 {
                0.0
            } else {
                positives as f64 / total as f64
            },
            samples: total,
        });

        let pure = positives == 0 || positives == total;
        if pure || depth >= self.params.max_depth || total < self.params.min_samples_split {
            return idx;
        }

        let Some(best) = self.best_split(sample, positives) else {
            return idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .copied()
            .partition(|&i| self.rows[i][best.feature] <= best.threshold);
        self.importance[best.feature] += best.decrease;

        let left_idx = self.build(&left, depth + 1);
        let right_idx = self.build(&right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_idx,
            right: right_idx,
        };
        idx
    }

    /// Lowest weighted Gini over a random subset of features
    fn best_split(&mut self, sample: &[usize], positives: usize) -> Option<BestSplit> {
        let n_features = self.rows.first().map_or(0, Vec::len);
        let mut features: Vec<usize> = (0..n_features).collect();
        let k = self.params.max_features.clamp(1, n_features.max(1));
        let (candidates, _) = features.partial_shuffle(&mut self.rng, k);

        let total = sample.len();
        let parent = gini(positives, total) * total as f64;
        let mut best: Option<BestSplit> = None;

        for &feature in candidates.iter() {
            let mut ordered: Vec<(f64, u8)> = sample
                .iter()
                .map(|&i| (self.rows[i][feature], self.labels[i]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0;
            for split in 1..total {
                left_pos += usize::from(ordered[split - 1].1);
                let (lo, hi) = (ordered[split - 1].0, ordered[split].0);
                if lo == hi {
                    continue;
                }
                let weighted = gini(left_pos, split) * split as f64
                    + gini(positives - left_pos, total - split) * (total - split) as f64;
                let decrease = parent - weighted;
                if decrease > best.as_ref().map_or(1e-12, |b| b.decrease) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    /// Fit a tree on the rows listed in `sample` (duplicates allowed)
    ///
    /// # Returns
    /// The tree and its unnormalised per-feature impurity decrease
    #[must_use]
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[u8],
        sample: &[usize],
        params: TreeParams,
        seed: u64,
    ) -> (Self, Vec<f64>) {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut builder = TreeBuilder {
            rows,
            labels,
            params,
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::new(),
            importance: vec![0.0; n_features],
        };
        builder.build(sample, 0);
        (
            Self {
                nodes: builder.nodes,
            },
            builder.importance,
        )
    }

    /// Positive-class probability of the leaf reached by `row`
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { probability, .. }) => return *probability,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
