//! Configuration for the risk assessment pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::utils::log_warning;

/// Marks threshold below which a student is labelled at risk
pub const DEFAULT_RISK_THRESHOLD: f64 = 50.0;

/// Fraction of rows held out for the test partition
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Seed used for the train/test split and model fitting
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Name of the binary target column
pub const TARGET_COLUMN: &str = "at_risk";

/// Columns that identify a student and never take part in training
pub const IDENTIFIER_COLUMNS: [&str; 4] = ["student_id", "roll_number", "id", "name"];

/// The classifier family backing a [`crate::model::RiskModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged CART trees with Gini splits
    #[default]
    RandomForest,
    /// L2-regularised logistic regression
    Logistic,
}

impl ModelKind {
    /// Stable textual tag used in file names and persisted models
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RandomForest => "random_forest",
            Self::Logistic => "logistic",
        }
    }

    /// Whether the model can report per-feature importance
    #[must_use]
    pub const fn supports_importance(self) -> bool {
        matches!(self, Self::RandomForest)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_forest" | "rf" | "forest" => Ok(Self::RandomForest),
            "logistic" | "logreg" => Ok(Self::Logistic),
            other => Err(RiskError::InvalidInput(format!(
                "Unknown model kind '{other}' (expected random_forest or logistic)"
            ))),
        }
    }
}

/// What to do with a categorical value that was not seen while fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnseenCategoryPolicy {
    /// Encode the value as [`crate::cleaning::UNKNOWN_CODE`]
    #[default]
    UnknownCode,
    /// Fail the transform with [`RiskError::UnseenCategory`]
    Reject,
}

/// Where `transform` takes its imputation statistics from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImputationSource {
    /// Reuse the medians and modes learned by `fit_transform`
    #[default]
    Fitted,
    /// Recompute medians and modes from each batch being cleaned
    CurrentBatch,
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum number of samples required to split a node
    pub min_samples_split: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
        }
    }
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Number of full-batch gradient steps
    pub iterations: usize,
    /// Gradient descent step size
    pub learning_rate: f64,
    /// L2 penalty strength
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            learning_rate: 0.1,
            l2: 0.01,
        }
    }
}

/// Configuration for the risk assessment pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Average marks strictly below this value are labelled at risk
    pub risk_threshold: f64,
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Seed for the split and for model fitting
    pub random_seed: u64,
    /// Classifier family to train
    pub model_kind: ModelKind,
    /// Apply z-score normalization after cleaning
    pub normalize: bool,
    /// Policy for categories not seen at fit time
    pub unseen_category_policy: UnseenCategoryPolicy,
    /// Source of imputation statistics for inference passes
    pub imputation_source: ImputationSource,
    /// Random forest settings
    pub forest: ForestConfig,
    /// Logistic regression settings
    pub logistic: LogisticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            test_size: DEFAULT_TEST_SIZE,
            random_seed: DEFAULT_RANDOM_SEED,
            model_kind: ModelKind::default(),
            normalize: false,
            unseen_category_policy: UnseenCategoryPolicy::default(),
            imputation_source: ImputationSource::default(),
            forest: ForestConfig::default(),
            logistic: LogisticConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration with overrides taken from the environment
    ///
    /// Recognised variables are `RISK_THRESHOLD`, `RISK_TEST_SIZE`,
    /// `RISK_RANDOM_SEED`, `RISK_MODEL_KIND` and `RISK_NORMALIZE`. Values
    /// that fail to parse are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults and values supplied by `lookup`
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(threshold) = parse_override(&lookup, "RISK_THRESHOLD") {
            config.risk_threshold = threshold;
        }
        if let Some(test_size) = parse_override(&lookup, "RISK_TEST_SIZE") {
            config.test_size = test_size;
        }
        if let Some(seed) = parse_override(&lookup, "RISK_RANDOM_SEED") {
            config.random_seed = seed;
        }
        if let Some(kind) = parse_override(&lookup, "RISK_MODEL_KIND") {
            config.model_kind = kind;
        }
        if let Some(normalize) = parse_override(&lookup, "RISK_NORMALIZE") {
            config.normalize = normalize;
        }
        config
    }

    /// Check that every setting is in range
    pub fn validate(&self) -> Result<()> {
        if !self.risk_threshold.is_finite() {
            return Err(RiskError::InvalidInput(
                "risk_threshold must be a finite number".to_string(),
            ));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(RiskError::InvalidInput(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.forest.n_estimators == 0 || self.forest.max_depth == 0 {
            return Err(RiskError::InvalidInput(
                "forest needs at least one tree of depth one".to_string(),
            ));
        }
        if self.logistic.learning_rate <= 0.0 || self.logistic.l2 < 0.0 {
            return Err(RiskError::InvalidInput(
                "logistic learning_rate must be positive and l2 non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log_warning(&format!("Ignoring unparsable {key}={raw}"), None);
            None
        }
    }
}
