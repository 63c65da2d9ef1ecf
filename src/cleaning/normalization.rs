//! Z-score scaling of numeric columns.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::Result;

/// Mean and scale of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    /// Column mean
    pub mean: f64,
    /// Population standard deviation, or 1 for constant columns
    pub scale: f64,
}

/// Fitted scaling parameters, in the column order they were fitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    columns: Vec<(String, ColumnScale)>,
}

impl NormalizationStats {
    /// Fit scales for the given columns
    pub fn fit(dataset: &Dataset, columns: &[String]) -> Result<Self> {
        let mut stats = Self::default();
        for name in columns {
            let values: Vec<f64> = dataset.numeric_values(name)?.into_iter().flatten().collect();
            if values.is_empty() {
                continue;
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            let scale = if std > 0.0 { std } else { 1.0 };
            stats.columns.push((name.clone(), ColumnScale { mean, scale }));
        }
        Ok(stats)
    }

    /// Scale every fitted column present in `dataset`; other columns pass through
    pub fn apply(&self, mut dataset: Dataset) -> Result<Dataset> {
        for (name, ColumnScale { mean, scale }) in &self.columns {
            if !dataset.is_numeric_column(name) {
                continue;
            }
            let scaled = dataset
                .numeric_values(name)?
                .into_iter()
                .map(|value| value.map(|v| (v - mean) / scale))
                .collect();
            dataset = dataset.with_numeric_column(name, scaled)?;
        }
        Ok(dataset)
    }

    /// Scale for one column
    #[must_use]
    pub fn scale(&self, column: &str) -> Option<ColumnScale> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, scale)| *scale)
    }

    /// Names of the fitted columns
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}
