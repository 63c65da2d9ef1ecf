//! Split of a cleaned dataset into a numeric feature matrix and labels.

use crate::config::IDENTIFIER_COLUMNS;
use crate::dataset::Dataset;
use crate::error::{Result, RiskError};

/// Row-major matrix of predictor values with named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureSet {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureSet {
    /// Build a feature set from named columns and rows
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidData`] if a row has the wrong width or a
    /// non-finite value
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(RiskError::InvalidData(format!(
                    "Row {idx} has {} values for {} feature columns",
                    row.len(),
                    columns.len()
                )));
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(RiskError::InvalidData(format!(
                    "Feature {} is not finite in row {idx}",
                    columns[col]
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Feature column names in matrix order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// One row of feature values
    #[must_use]
    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of feature columns
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.columns.len()
    }

    /// Rows at the given indices, in the given order
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Align to an ordered column list
    ///
    /// Columns in `columns` that this set lacks are filled with 0; columns not
    /// in `columns` are dropped.
    ///
    /// # Returns
    /// The aligned set plus the names of the filled and dropped columns
    #[must_use]
    pub fn reconcile(&self, columns: &[String]) -> (Self, Vec<String>, Vec<String>) {
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|name| self.columns.iter().position(|c| c == name))
            .collect();
        let filled = columns
            .iter()
            .zip(&positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        let dropped = self
            .columns
            .iter()
            .filter(|name| !columns.contains(name))
            .cloned()
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| pos.map_or(0.0, |p| row[p]))
                    .collect()
            })
            .collect();
        (
            Self {
                columns: columns.to_vec(),
                rows,
            },
            filled,
            dropped,
        )
    }
}

/// Binary target values, one per row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label {
    values: Vec<u8>,
}

impl Label {
    /// Build labels, checking every value is 0 or 1
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidData`] on any other value
    pub fn new(values: Vec<u8>) -> Result<Self> {
        if let Some(idx) = values.iter().position(|v| *v > 1) {
            return Err(RiskError::InvalidData(format!(
                "Label in row {idx} is {}; expected 0 or 1",
                values[idx]
            )));
        }
        Ok(Self { values })
    }

    /// Label values
    #[must_use]
    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Number of labels
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no labels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of positive (at-risk) labels
    #[must_use]
    pub fn positives(&self) -> usize {
        self.values.iter().filter(|v| **v == 1).count()
    }

    /// Labels at the given indices
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            values: indices.iter().map(|&i| self.values[i]).collect(),
        }
    }
}

/// Split a cleaned dataset into predictors and an optional target
///
/// Identifier columns and `target` are never predictors. The target is
/// returned only if the column exists.
///
/// # Arguments
/// * `dataset` - Cleaned dataset with numeric columns only
/// * `target` - Name of the binary label column
///
/// # Errors
/// Returns [`RiskError::InvalidData`] for a missing or non-finite feature cell,
/// a non-numeric feature column, or a label outside {0, 1}
pub fn prepare_for_training(dataset: &Dataset, target: &str) -> Result<(FeatureSet, Option<Label>)> {
    let columns: Vec<String> = dataset
        .column_names()
        .into_iter()
        .filter(|name| name != target && !IDENTIFIER_COLUMNS.contains(&name.as_str()))
        .collect();

    let mut rows = vec![Vec::with_capacity(columns.len()); dataset.num_rows()];
    for name in &columns {
        if !dataset.is_numeric_column(name) {
            return Err(RiskError::InvalidData(format!(
                "Feature {name} is not numeric; clean the dataset first"
            )));
        }
        for (idx, value) in dataset.numeric_values(name)?.into_iter().enumerate() {
            let value = value.ok_or_else(|| {
                RiskError::InvalidData(format!("Feature {name} is missing in row {idx}"))
            })?;
            rows[idx].push(value);
        }
    }
    let features = FeatureSet::new(columns, rows)?;

    let label = if dataset.has_column(target) {
        let values = dataset
            .numeric_values(target)?
            .into_iter()
            .enumerate()
            .map(|(idx, value)| match value {
                Some(v) if v == 0.0 => Ok(0),
                Some(v) if v == 1.0 => Ok(1),
                other => Err(RiskError::InvalidData(format!(
                    "Label {target} in row {idx} is {other:?}; expected 0 or 1"
                ))),
            })
            .collect::<Result<Vec<u8>>>()?;
        Some(Label::new(values)?)
    } else {
        None
    };

    Ok((features, label))
}
