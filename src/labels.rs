//! Threshold labelling of the engineered average marks.

use std::sync::Arc;

use arrow::array::Float64Array;

use crate::config::{DEFAULT_RISK_THRESHOLD, TARGET_COLUMN};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::features::AVERAGE_MARKS;
use crate::utils::log_warning;

/// Result of a labelling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    /// Labels were written; `at_risk` rows have label 1
    Labelled {
        /// Number of rows labelled 1
        at_risk: usize,
        /// Number of rows labelled
        total: usize,
    },
    /// `average_marks` is absent, the dataset was returned unchanged
    Skipped,
}

impl LabelOutcome {
    /// Whether any labels were written
    #[must_use]
    pub const fn is_labelled(self) -> bool {
        matches!(self, Self::Labelled { .. })
    }
}

/// Converts average marks into a binary at-risk target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLabeler {
    threshold: f64,
}

impl Default for RiskLabeler {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_THRESHOLD)
    }
}

impl RiskLabeler {
    /// Create a labeler; averages strictly below `threshold` are at risk
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The configured threshold
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Write the `at_risk` column
    ///
    /// A missing average is labelled 0. An existing `at_risk` column is
    /// replaced in place.
    ///
    /// # Returns
    /// The dataset and whether labelling happened. Without `average_marks`
    /// the dataset is returned untouched with [`LabelOutcome::Skipped`].
    pub fn label(&self, dataset: Dataset) -> Result<(Dataset, LabelOutcome)> {
        if !dataset.is_numeric_column(AVERAGE_MARKS) {
            log_warning(
                &format!("Column {AVERAGE_MARKS} not found; no {TARGET_COLUMN} labels written"),
                None,
            );
            return Ok((dataset, LabelOutcome::Skipped));
        }

        let labels: Float64Array = dataset
            .numeric_values(AVERAGE_MARKS)?
            .into_iter()
            .map(|avg| Some(if avg.is_some_and(|v| v < self.threshold) { 1.0 } else { 0.0 }))
            .collect();
        let at_risk = labels.values().iter().filter(|v| **v == 1.0).count();
        let total = labels.len();

        let dataset = dataset.with_column(TARGET_COLUMN, Arc::new(labels))?;
        log::info!(
            "Labelled {total} students: {at_risk} with {AVERAGE_MARKS} below {}",
            self.threshold
        );
        Ok((dataset, LabelOutcome::Labelled { at_risk, total }))
    }
}
