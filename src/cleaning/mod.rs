//! Cleaning of raw student tables.
//!
//! The [`DataCleaner`] fills missing values, encodes categorical columns to
//! integer codes and, on request, z-score normalizes numeric columns. Every
//! statistic it learns while fitting is kept in a [`CleanerState`] so that
//! inference batches are cleaned exactly like the training batch.

pub mod encoding;
pub mod imputation;
pub mod normalization;

use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{
    IDENTIFIER_COLUMNS, ImputationSource, PipelineConfig, TARGET_COLUMN, UnseenCategoryPolicy,
};
use crate::dataset::Dataset;
use crate::error::{Result, RiskError};
use crate::utils::{log_operation_complete, log_warning};

pub use encoding::{CategoryEncoding, EncodingState, UNKNOWN_CODE};
pub use imputation::{ImputationStats, UNKNOWN_CATEGORY};
pub use normalization::{ColumnScale, NormalizationStats};

/// Everything a cleaner learns while fitting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanerState {
    /// Category codes per text column
    pub encodings: EncodingState,
    /// Training-time medians and modes
    pub imputation: ImputationStats,
    /// Z-score parameters, when normalization was fitted
    pub normalization: Option<NormalizationStats>,
    /// Columns read as numeric when fitting
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    /// Whether `fit_transform` has run
    pub fitted: bool,
}

/// Fills, encodes and optionally normalizes student tables
#[derive(Debug, Clone, Default)]
pub struct DataCleaner {
    unseen_policy: UnseenCategoryPolicy,
    imputation_source: ImputationSource,
    state: CleanerState,
}

impl DataCleaner {
    /// Create an unfitted cleaner with default policies
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unfitted cleaner with the policies from `config`
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            unseen_policy: config.unseen_category_policy,
            imputation_source: config.imputation_source,
            state: CleanerState::default(),
        }
    }

    /// Change how unseen categories are handled
    #[must_use]
    pub const fn with_unseen_policy(mut self, policy: UnseenCategoryPolicy) -> Self {
        self.unseen_policy = policy;
        self
    }

    /// Change where inference-time imputation statistics come from
    #[must_use]
    pub const fn with_imputation_source(mut self, source: ImputationSource) -> Self {
        self.imputation_source = source;
        self
    }

    /// Whether `fit_transform` has been called
    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.state.fitted
    }

    /// The fitted category encodings
    #[must_use]
    pub const fn encoding_state(&self) -> &EncodingState {
        &self.state.encodings
    }

    /// The fitted imputation statistics
    #[must_use]
    pub const fn imputation_stats(&self) -> &ImputationStats {
        &self.state.imputation
    }

    /// The full learned state
    #[must_use]
    pub const fn state(&self) -> &CleanerState {
        &self.state
    }

    /// Fit imputation and encodings on a training batch and clean it
    ///
    /// Any previous state is replaced.
    pub fn fit_transform(&mut self, dataset: Dataset) -> Result<Dataset> {
        let start = Instant::now();
        let imputation = ImputationStats::compute(&dataset, &|_: &str| false)?;
        let (numeric_columns, text_columns): (Vec<String>, Vec<String>) = dataset
            .column_names()
            .into_iter()
            .partition(|name| dataset.is_numeric_column(name));

        let mut dataset = fill_numeric(dataset, &imputation, &[])?;
        let mut encodings = EncodingState::default();
        for name in &text_columns {
            let values = fill_text(&dataset, name, &imputation)?;
            let encoding = encodings.fit_column(name, &values);
            let codes = values
                .iter()
                .map(|value| encoding.code(value).map(|code| code as f64))
                .collect();
            dataset = dataset.with_numeric_column(name, codes)?;
        }

        self.state = CleanerState {
            encodings,
            imputation,
            normalization: None,
            numeric_columns,
            fitted: true,
        };
        log_operation_complete(
            "cleaned (fit)",
            &"training batch",
            dataset.num_rows(),
            Some(start.elapsed()),
        );
        Ok(dataset)
    }

    /// Clean an inference batch with the fitted state
    ///
    /// Columns that were numeric at fit time are read as numbers whatever
    /// type the batch was loaded with, so a blank or text-typed column is
    /// imputed rather than encoded. Identifier columns never go through the
    /// unseen-category policy.
    ///
    /// # Errors
    /// Returns [`RiskError::NotFitted`] before `fit_transform`,
    /// [`RiskError::InvalidData`] for a non-numeric cell in a numeric column,
    /// or [`RiskError::UnseenCategory`] under the reject policy
    pub fn transform(&self, mut dataset: Dataset) -> Result<Dataset> {
        if !self.state.fitted {
            return Err(RiskError::NotFitted);
        }
        let start = Instant::now();
        for name in &self.state.numeric_columns {
            if dataset.has_column(name) && !dataset.is_numeric_column(name) {
                let values = dataset.parse_numeric_values(name)?;
                dataset = dataset.with_numeric_column(name, values)?;
            }
        }

        let encodings = &self.state.encodings;
        let is_categorical = |name: &str| encodings.contains(name);
        let batch_stats = ImputationStats::compute(&dataset, &is_categorical)?;
        let imputation = match self.imputation_source {
            ImputationSource::Fitted => {
                let mut stats = self.state.imputation.clone();
                stats.merge_missing_from(batch_stats);
                stats
            }
            ImputationSource::CurrentBatch => batch_stats,
        };

        let text_columns: Vec<String> = dataset
            .column_names()
            .into_iter()
            .filter(|name| encodings.contains(name) || !dataset.is_numeric_column(name))
            .collect();

        let mut dataset = fill_numeric(dataset, &imputation, &text_columns)?;
        for name in &text_columns {
            let values = fill_text(&dataset, name, &imputation)?;
            let identifier = IDENTIFIER_COLUMNS.contains(&name.as_str());
            let policy = if identifier {
                UnseenCategoryPolicy::UnknownCode
            } else {
                self.unseen_policy
            };
            let (codes, unseen) = encodings.encode(name, &values, policy)?;
            if unseen > 0 && !identifier {
                log_warning(
                    &format!("{unseen} unseen categories encoded as {UNKNOWN_CODE}"),
                    Some(name),
                );
            }
            dataset = dataset.with_numeric_column(name, codes.into_iter().map(Some).collect())?;
        }

        log_operation_complete(
            "cleaned",
            &"inference batch",
            dataset.num_rows(),
            Some(start.elapsed()),
        );
        Ok(dataset)
    }

    /// Fit z-score parameters on a cleaned batch and apply them
    ///
    /// Only originally numeric columns are scaled: encoded categorical
    /// columns, identifier columns and the target column are left untouched.
    pub fn fit_normalization(&mut self, dataset: Dataset) -> Result<Dataset> {
        let columns: Vec<String> = dataset
            .column_names()
            .into_iter()
            .filter(|name| {
                dataset.is_numeric_column(name)
                    && !self.state.encodings.contains(name)
                    && !IDENTIFIER_COLUMNS.contains(&name.as_str())
                    && name != TARGET_COLUMN
            })
            .collect();
        let stats = NormalizationStats::fit(&dataset, &columns)?;
        let dataset = stats.apply(dataset)?;
        self.state.normalization = Some(stats);
        Ok(dataset)
    }

    /// Apply previously fitted z-score parameters
    ///
    /// # Errors
    /// Returns [`RiskError::NotFitted`] if normalization was never fitted
    pub fn normalize(&self, dataset: Dataset) -> Result<Dataset> {
        self.state
            .normalization
            .as_ref()
            .ok_or(RiskError::NotFitted)?
            .apply(dataset)
    }

    /// Fit and clean a training batch, optionally normalizing it
    pub fn clean_pipeline(&mut self, dataset: Dataset, normalize: bool) -> Result<Dataset> {
        let dataset = self.fit_transform(dataset)?;
        if normalize {
            self.fit_normalization(dataset)
        } else {
            Ok(dataset)
        }
    }

    /// Write the learned state as JSON
    pub fn save_state(&self, path: &Path) -> Result<()> {
        if !self.state.fitted {
            return Err(RiskError::NotFitted);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.state)?)?;
        Ok(())
    }

    /// Replace the learned state with one written by [`Self::save_state`]
    pub fn load_state(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(RiskError::ModelNotFound(path.display().to_string()));
        }
        self.state = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(())
    }
}

/// Replace numeric columns by `Float64` columns without nulls
fn fill_numeric(
    mut dataset: Dataset,
    imputation: &ImputationStats,
    skip: &[String],
) -> Result<Dataset> {
    for name in dataset.column_names() {
        if !dataset.is_numeric_column(&name) || skip.contains(&name) {
            continue;
        }
        let fill = imputation.median(&name).unwrap_or(0.0);
        let values = dataset
            .numeric_values(&name)?
            .into_iter()
            .map(|value| Some(value.unwrap_or(fill)))
            .collect();
        dataset = dataset.with_numeric_column(&name, values)?;
    }
    Ok(dataset)
}

fn fill_text(dataset: &Dataset, name: &str, imputation: &ImputationStats) -> Result<Vec<String>> {
    let fill = imputation.mode(name).unwrap_or(UNKNOWN_CATEGORY);
    Ok(dataset
        .text_values(name)?
        .into_iter()
        .map(|value| value.unwrap_or_else(|| fill.to_string()))
        .collect())
}
