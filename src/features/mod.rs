//! Derived features computed from the raw columns of a student table.
//!
//! [`FeatureEngineer::derive`] is a pure function of the dataset's current
//! columns. Derived columns are only ever appended (or recomputed in place
//! when already present); raw columns are never touched.

pub mod training;

use std::time::Instant;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::utils::{log_operation_complete, log_warning};

pub use training::{FeatureSet, Label, prepare_for_training};

/// Per-row mean of the mark columns
pub const AVERAGE_MARKS: &str = "average_marks";
/// Per-row sample standard deviation of the mark columns
pub const MARKS_STD: &str = "marks_std";
/// Per-row minimum of the mark columns
pub const MARKS_MIN: &str = "marks_min";
/// Per-row maximum of the mark columns
pub const MARKS_MAX: &str = "marks_max";
/// Attendance as a percentage of total classes
pub const ATTENDANCE_RATE: &str = "attendance_rate";
/// Completed assignments as a percentage of total assignments
pub const ASSIGNMENT_COMPLETION_RATE: &str = "assignment_completion_rate";
/// Difference between the current average and the previous marks
pub const MARKS_IMPROVEMENT: &str = "marks_improvement";

/// Columns produced by the engineer itself
pub const DERIVED_COLUMNS: [&str; 7] = [
    AVERAGE_MARKS,
    MARKS_STD,
    MARKS_MIN,
    MARKS_MAX,
    ATTENDANCE_RATE,
    ASSIGNMENT_COMPLETION_RATE,
    MARKS_IMPROVEMENT,
];

/// Ratio features: (output, numerator, denominator)
const RATIO_FEATURES: [(&str, &str, &str); 2] = [
    (ATTENDANCE_RATE, "attendance", "total_classes"),
    (
        ASSIGNMENT_COMPLETION_RATE,
        "assignments_completed",
        "total_assignments",
    ),
];

/// Source column of the improvement delta
const PREVIOUS_MARKS: &str = "previous_marks";

/// The numeric columns whose names mention marks or scores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkColumns {
    columns: Vec<String>,
}

impl MarkColumns {
    /// Inspect the schema once and collect the eligible mark columns
    ///
    /// A column is eligible when its lowercase name contains `mark` or
    /// `score`, it is read as numeric, and it is not one of the engineer's own
    /// output columns.
    #[must_use]
    pub fn detect(dataset: &Dataset) -> Self {
        let columns = dataset
            .column_names()
            .into_iter()
            .filter(|name| {
                let lower = name.to_lowercase();
                (lower.contains("mark") || lower.contains("score"))
                    && !DERIVED_COLUMNS.contains(&name.as_str())
                    && dataset.is_numeric_column(name)
            })
            .collect();
        Self { columns }
    }

    /// Eligible column names in schema order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.columns
    }

    /// Whether enough columns exist for aggregate statistics
    #[must_use]
    pub fn is_aggregatable(&self) -> bool {
        self.columns.len() >= 2
    }
}

/// Mean, sample standard deviation, minimum and maximum of one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowStats {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation; zero for a single value
    pub std: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

impl RowStats {
    /// Statistics of the present values, `None` when all are missing
    #[must_use]
    pub fn of(values: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let std = if present.len() > 1 {
            (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, std, min, max })
    }
}

/// A derivation that could not run because source columns are missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationSkipped {
    /// Output column that was not produced
    pub feature: String,
    /// Why it was skipped
    pub reason: String,
}

/// What a call to [`FeatureEngineer::derive`] produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureReport {
    /// Columns written, in order
    pub derived: Vec<String>,
    /// Derivations whose preconditions were not met
    pub skipped: Vec<DerivationSkipped>,
}

/// Stateless builder of aggregate and ratio features
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Create a feature engineer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Append derived features to a dataset
    pub fn derive(&self, dataset: Dataset) -> Result<Dataset> {
        self.derive_with_report(dataset).map(|(dataset, _)| dataset)
    }

    /// Append derived features and report which derivations ran
    pub fn derive_with_report(&self, dataset: Dataset) -> Result<(Dataset, FeatureReport)> {
        let start = Instant::now();
        let mut report = FeatureReport::default();
        let marks = MarkColumns::detect(&dataset);

        let mut dataset = if marks.is_aggregatable() {
            let derived = derive_mark_statistics(dataset, &marks)?;
            report
                .derived
                .extend([AVERAGE_MARKS, MARKS_STD, MARKS_MIN, MARKS_MAX].map(String::from));
            derived
        } else {
            for feature in [AVERAGE_MARKS, MARKS_STD, MARKS_MIN, MARKS_MAX] {
                report.skipped.push(DerivationSkipped {
                    feature: feature.to_string(),
                    reason: format!(
                        "needs at least two mark or score columns, found {}",
                        marks.names().len()
                    ),
                });
            }
            dataset
        };

        for (output, numerator, denominator) in RATIO_FEATURES {
            if dataset.is_numeric_column(numerator) && dataset.is_numeric_column(denominator) {
                dataset = derive_rate(dataset, output, numerator, denominator)?;
                report.derived.push(output.to_string());
            } else {
                report.skipped.push(DerivationSkipped {
                    feature: output.to_string(),
                    reason: format!("needs numeric columns {numerator} and {denominator}"),
                });
            }
        }

        if dataset.is_numeric_column(AVERAGE_MARKS) && dataset.is_numeric_column(PREVIOUS_MARKS) {
            let current = dataset.numeric_values(AVERAGE_MARKS)?;
            let previous = dataset.numeric_values(PREVIOUS_MARKS)?;
            let improvement = current
                .iter()
                .zip(&previous)
                .map(|(c, p)| Some((*c)? - (*p)?))
                .collect();
            dataset = dataset.with_numeric_column(MARKS_IMPROVEMENT, improvement)?;
            report.derived.push(MARKS_IMPROVEMENT.to_string());
        } else {
            report.skipped.push(DerivationSkipped {
                feature: MARKS_IMPROVEMENT.to_string(),
                reason: format!("needs numeric columns {AVERAGE_MARKS} and {PREVIOUS_MARKS}"),
            });
        }

        for skipped in &report.skipped {
            log::debug!("Skipped feature {}: {}", skipped.feature, skipped.reason);
        }
        log_operation_complete(
            &format!("derived {} features for", report.derived.len()),
            &"student table",
            dataset.num_rows(),
            Some(start.elapsed()),
        );
        Ok((dataset, report))
    }
}

fn derive_mark_statistics(dataset: Dataset, marks: &MarkColumns) -> Result<Dataset> {
    let columns = marks
        .names()
        .iter()
        .map(|name| dataset.numeric_values(name))
        .collect::<Result<Vec<_>>>()?;

    let stats: Vec<Option<RowStats>> = (0..dataset.num_rows())
        .map(|row| {
            let values: Vec<Option<f64>> = columns.iter().map(|column| column[row]).collect();
            RowStats::of(&values)
        })
        .collect();

    dataset
        .with_numeric_column(AVERAGE_MARKS, stats.iter().map(|s| s.map(|s| s.mean)).collect())?
        .with_numeric_column(MARKS_STD, stats.iter().map(|s| s.map(|s| s.std)).collect())?
        .with_numeric_column(MARKS_MIN, stats.iter().map(|s| s.map(|s| s.min)).collect())?
        .with_numeric_column(MARKS_MAX, stats.iter().map(|s| s.map(|s| s.max)).collect())
}

/// `numerator * 100 / denominator`; a zero denominator yields 0
fn derive_rate(dataset: Dataset, output: &str, numerator: &str, denominator: &str) -> Result<Dataset> {
    let top = dataset.numeric_values(numerator)?;
    let bottom = dataset.numeric_values(denominator)?;
    let mut zero_denominators = 0;
    let rates = top
        .iter()
        .zip(&bottom)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) if *d != 0.0 => Some(n * 100.0 / d),
            (Some(_), _) => {
                zero_denominators += 1;
                Some(0.0)
            }
            (None, _) => None,
        })
        .collect();
    if zero_denominators > 0 {
        log_warning(
            &format!("{zero_denominators} rows have a zero or missing {denominator}; {output} set to 0"),
            None,
        );
    }
    dataset.with_numeric_column(output, rates)
}
