//! Bagged ensemble of CART trees.

use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use crate::config::ForestConfig;

/// A fitted random forest for binary labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    importance: Vec<f64>,
}

impl RandomForest {
    /// Fit `config.n_estimators` trees on bootstrap samples
    ///
    /// Tree `i` draws its bootstrap sample and feature subsets from
    /// `seed + i`. Trees are fitted in parallel and kept in index order, so
    /// the forest is identical for a given seed regardless of thread count.
    #[must_use]
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], config: &ForestConfig, seed: u64) -> Self {
        let n_rows = rows.len();
        let n_features = rows.first().map_or(0, Vec::len);
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: ((n_features as f64).sqrt().floor() as usize).max(1),
        };

        if n_rows == 0 {
            return Self {
                trees: Vec::new(),
                importance: vec![0.0; n_features],
            };
        }

        let fitted: Vec<(DecisionTree, Vec<f64>)> = (0..config.n_estimators)
            .into_par_iter()
            .map(|i| {
                let tree_seed = seed.wrapping_add(i as u64);
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let sample: Vec<usize> = (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect();
                DecisionTree::fit(rows, labels, &sample, params, rng.random())
            })
            .collect();

        let mut importance = vec![0.0; n_features];
        for (_, tree_importance) in &fitted {
            let total: f64 = tree_importance.iter().sum();
            if total > 0.0 {
                for (acc, value) in importance.iter_mut().zip(tree_importance) {
                    *acc += value / total;
                }
            }
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }

        Self {
            trees: fitted.into_iter().map(|(tree, _)| tree).collect(),
            importance,
        }
    }

    /// Mean leaf probability across trees
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_proba(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Mean decrease in impurity per feature, summing to 1 unless no split occurred
    #[must_use]
    pub fn feature_importance(&self) -> &[f64] {
        &self.importance
    }

    /// Number of trees
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
