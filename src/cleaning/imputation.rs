//! Missing-value statistics: medians for numeric columns, modes for text.

use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::Result;

/// Fill value for text columns without any observed value
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Per-column fill values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationStats {
    numeric: FxHashMap<String, f64>,
    categorical: FxHashMap<String, String>,
}

impl ImputationStats {
    /// Compute medians and modes from every column of a batch
    ///
    /// Text columns are those not read as numeric, plus any listed in
    /// `force_text` (columns that were categorical when the cleaner was fitted).
    pub fn compute(dataset: &Dataset, force_text: &dyn Fn(&str) -> bool) -> Result<Self> {
        let mut stats = Self::default();
        for name in dataset.column_names() {
            if dataset.is_numeric_column(&name) && !force_text(&name) {
                let values = dataset.numeric_values(&name)?;
                if let Some(median) = median(&values) {
                    stats.numeric.insert(name, median);
                }
            } else {
                let values = dataset.text_values(&name)?;
                let fill = mode(&values).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
                stats.categorical.insert(name, fill);
            }
        }
        Ok(stats)
    }

    /// Median recorded for a numeric column
    #[must_use]
    pub fn median(&self, column: &str) -> Option<f64> {
        self.numeric.get(column).copied()
    }

    /// Mode recorded for a text column
    #[must_use]
    pub fn mode(&self, column: &str) -> Option<&str> {
        self.categorical.get(column).map(String::as_str)
    }

    /// Fill in columns this set has no statistic for from `other`
    pub fn merge_missing_from(&mut self, other: Self) {
        for (name, value) in other.numeric {
            self.numeric.entry(name).or_insert(value);
        }
        for (name, value) in other.categorical {
            self.categorical.entry(name).or_insert(value);
        }
    }
}

/// Median of the present values; `None` when every value is missing
#[must_use]
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let sorted = values
        .iter()
        .flatten()
        .copied()
        .sorted_by(f64::total_cmp)
        .collect_vec();
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent present value, ties resolved to the smallest value
#[must_use]
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let counts = values.iter().flatten().counts();
    counts
        .into_iter()
        .sorted_by(|(a, count_a), (b, count_b)| count_b.cmp(count_a).then_with(|| a.cmp(b)))
        .next()
        .map(|(value, _)| value.clone())
}
