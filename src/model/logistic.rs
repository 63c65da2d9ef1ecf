//! L2-regularised logistic regression fitted by full-batch gradient descent.

use serde::{Deserialize, Serialize};

use crate::config::LogisticConfig;

/// A fitted logistic regression over standardised features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    /// Fit weights starting from zero
    ///
    /// Features are standardised with the training mean and population
    /// standard deviation (constant features keep scale 1).
    #[must_use]
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], config: &LogisticConfig) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;

        let means: Vec<f64> = (0..n_features)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales: Vec<f64> = (0..n_features)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                if var > 0.0 { var.sqrt() } else { 1.0 }
            })
            .collect();

        let mut model = Self {
            means,
            scales,
            weights: vec![0.0; n_features],
            bias: 0.0,
        };
        let standardised: Vec<Vec<f64>> = rows.iter().map(|r| model.standardise(r)).collect();

        for _ in 0..config.iterations {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (x, y) in standardised.iter().zip(labels) {
                let err = model.linear_proba(x) - f64::from(*y);
                for (g, xj) in grad_w.iter_mut().zip(x) {
                    *g += err * xj;
                }
                grad_b += err;
            }
            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= config.learning_rate * (g / n + config.l2 * *w);
            }
            model.bias -= config.learning_rate * grad_b / n;
        }
        model
    }

    fn standardise(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (mean, scale))| (v - mean) / scale)
            .collect()
    }

    fn linear_proba(&self, standardised: &[f64]) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(standardised)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        sigmoid(z)
    }

    /// Positive-class probability for a raw feature row
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        self.linear_proba(&self.standardise(row))
    }

    /// Fitted weights on the standardised scale
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}
