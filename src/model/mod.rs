//! Binary at-risk classifier with train, predict and persistence.
//!
//! A [`RiskModel`] starts untrained. [`RiskModel::train`] or
//! [`RiskModel::restore`] put it in the trained state, recording the ordered
//! feature columns that every later prediction is aligned to.

pub mod forest;
pub mod logistic;
pub mod persist;
pub mod split;
pub mod tree;

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_RANDOM_SEED, DEFAULT_TEST_SIZE, ForestConfig, LogisticConfig, ModelKind,
    PipelineConfig,
};
use crate::dataset::StudentRecord;
use crate::error::{Result, RiskError};
use crate::features::{FeatureSet, Label};
use crate::utils::log_warning;

pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use persist::{FittedModel, PersistedModel};
pub use split::{TrainTestSplit, train_test_split};

/// Probability above which a row is labelled at risk
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Accuracy on the two partitions of a training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Fraction of training rows predicted correctly
    pub train_accuracy: f64,
    /// Fraction of held-out rows predicted correctly
    pub test_accuracy: f64,
    /// Rows in the training partition
    pub train_rows: usize,
    /// Rows in the test partition
    pub test_rows: usize,
}

/// Labels and positive-class probabilities for a batch, in input row order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prediction {
    /// 1 for at risk, 0 otherwise
    pub labels: Vec<u8>,
    /// Probability of the at-risk class
    pub probabilities: Vec<f64>,
}

impl Prediction {
    /// Number of predicted rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no rows were predicted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Per-row results
    pub fn results(&self) -> impl Iterator<Item = PredictionResult> + '_ {
        self.labels
            .iter()
            .zip(&self.probabilities)
            .map(|(&label, &probability)| PredictionResult::new(label, probability))
    }
}

/// Outcome of predicting one student
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 1 for at risk, 0 otherwise
    pub prediction: u8,
    /// Whether `prediction` is 1
    pub is_at_risk: bool,
    /// Probability of the at-risk class
    pub risk_probability: f64,
}

impl PredictionResult {
    /// Build a result from a label and probability
    #[must_use]
    pub const fn new(prediction: u8, risk_probability: f64) -> Self {
        Self {
            prediction,
            is_at_risk: prediction == 1,
            risk_probability,
        }
    }
}

/// Importance of one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Fraction of equal entries
fn accuracy(predicted: &[u8], actual: &[u8]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let hits = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
    hits as f64 / actual.len() as f64
}

/// A binary classifier over a recorded, ordered feature list
#[derive(Debug, Clone)]
pub struct RiskModel {
    kind: ModelKind,
    forest: ForestConfig,
    logistic: LogisticConfig,
    random_seed: u64,
    test_size: f64,
    model: Option<FittedModel>,
    feature_columns: Vec<String>,
    trained_at: Option<DateTime<Utc>>,
}

impl RiskModel {
    /// An untrained model of the given kind with default settings
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            forest: ForestConfig::default(),
            logistic: LogisticConfig::default(),
            random_seed: DEFAULT_RANDOM_SEED,
            test_size: DEFAULT_TEST_SIZE,
            model: None,
            feature_columns: Vec::new(),
            trained_at: None,
        }
    }

    /// An untrained model using the kind, seed, split and hyperparameters of `config`
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            kind: config.model_kind,
            forest: config.forest,
            logistic: config.logistic,
            random_seed: config.random_seed,
            test_size: config.test_size,
            ..Self::new(config.model_kind)
        }
    }

    /// Read a persisted model into a new instance
    pub fn load(path: &Path) -> Result<Self> {
        let mut model = Self::new(ModelKind::default());
        model.restore(path)?;
        Ok(model)
    }

    /// The classifier family
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Whether the model can predict
    #[must_use]
    pub const fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Ordered feature columns recorded at training time
    #[must_use]
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// When the current estimator was fitted
    #[must_use]
    pub const fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    /// The fitted estimator, if any
    #[must_use]
    pub const fn fitted(&self) -> Option<&FittedModel> {
        self.model.as_ref()
    }

    /// Split, fit on the training partition and score both partitions
    ///
    /// The split and the estimator are seeded, so repeated calls on the same
    /// data give identical metrics. On success the model is trained and the
    /// feature column order of `features` is recorded.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidInput`] if label and row counts differ or
    /// the data cannot be split
    pub fn train(&mut self, features: &FeatureSet, labels: &Label) -> Result<TrainingMetrics> {
        if features.num_rows() != labels.len() {
            return Err(RiskError::InvalidInput(format!(
                "{} feature rows but {} labels",
                features.num_rows(),
                labels.len()
            )));
        }
        if features.num_features() == 0 {
            return Err(RiskError::InvalidInput(
                "No feature columns to train on".to_string(),
            ));
        }
        let start = Instant::now();
        let split = train_test_split(features.num_rows(), self.test_size, self.random_seed)?;
        let train_x = features.take(&split.train);
        let train_y = labels.take(&split.train);
        let test_x = features.take(&split.test);
        let test_y = labels.take(&split.test);

        if train_y.positives() == 0 || train_y.positives() == train_y.len() {
            log_warning(
                "Training partition holds a single class; predictions will be constant",
                Some(&self.kind),
            );
        }

        let model = match self.kind {
            ModelKind::RandomForest => FittedModel::RandomForest(RandomForest::fit(
                train_x.rows(),
                train_y.values(),
                &self.forest,
                self.random_seed,
            )),
            ModelKind::Logistic => FittedModel::Logistic(LogisticRegression::fit(
                train_x.rows(),
                train_y.values(),
                &self.logistic,
            )),
        };

        let train_pred = predict_rows(&model, train_x.rows());
        let test_pred = predict_rows(&model, test_x.rows());
        let metrics = TrainingMetrics {
            train_accuracy: accuracy(&train_pred.labels, train_y.values()),
            test_accuracy: accuracy(&test_pred.labels, test_y.values()),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
        };

        self.model = Some(model);
        self.feature_columns = features.columns().to_vec();
        self.trained_at = Some(Utc::now());

        log::info!(
            "Trained {} on {} rows in {:?} (train accuracy {:.3}, test accuracy {:.3})",
            self.kind,
            metrics.train_rows,
            start.elapsed(),
            metrics.train_accuracy,
            metrics.test_accuracy
        );
        Ok(metrics)
    }

    /// Predict every row after aligning columns to the training order
    ///
    /// Training columns missing from `features` are filled with 0 and extra
    /// columns are dropped.
    ///
    /// # Errors
    /// Returns [`RiskError::NotTrained`] before training or restoring
    pub fn predict(&self, features: &FeatureSet) -> Result<Prediction> {
        let model = self.require_trained("predict")?;
        let (aligned, filled, dropped) = features.reconcile(&self.feature_columns);
        if !filled.is_empty() {
            log_warning(
                &format!("Filled missing feature columns with 0: {}", filled.iter().join(", ")),
                None,
            );
        }
        if !dropped.is_empty() {
            log::debug!("Dropped columns unknown to the model: {}", dropped.iter().join(", "));
        }
        Ok(predict_rows(model, aligned.rows()))
    }

    /// Predict one cleaned record
    ///
    /// Feature values are read by name; absent or non-numeric values count as 0.
    pub fn predict_single(&self, record: &StudentRecord) -> Result<PredictionResult> {
        let model = self.require_trained("predict")?;
        let row: Vec<f64> = self
            .feature_columns
            .iter()
            .map(|name| record.number(name).filter(|v| v.is_finite()).unwrap_or(0.0))
            .collect();
        let probability = model.predict_proba(&row);
        Ok(PredictionResult::new(
            u8::from(probability > DECISION_THRESHOLD),
            probability,
        ))
    }

    /// Per-feature importance, most important first
    ///
    /// `None` for model kinds without importance or before training.
    #[must_use]
    pub fn feature_importance(&self) -> Option<Vec<FeatureImportance>> {
        let Some(FittedModel::RandomForest(forest)) = &self.model else {
            return None;
        };
        Some(
            self.feature_columns
                .iter()
                .zip(forest.feature_importance())
                .map(|(feature, &importance)| FeatureImportance {
                    feature: feature.clone(),
                    importance,
                })
                .sorted_by(|a, b| b.importance.total_cmp(&a.importance))
                .collect(),
        )
    }

    /// Write the model as JSON
    ///
    /// # Errors
    /// Returns [`RiskError::NotTrained`] for an untrained model
    pub fn persist(&self, path: &Path) -> Result<()> {
        let model = self.require_trained("persist")?;
        PersistedModel {
            model_kind: self.kind,
            model: model.clone(),
            feature_columns: self.feature_columns.clone(),
            trained: true,
            trained_at: self.trained_at.unwrap_or_else(Utc::now),
        }
        .write(path)?;
        log::info!("Saved {} model to {}", self.kind, path.display());
        Ok(())
    }

    /// Replace all state with a persisted model
    ///
    /// # Errors
    /// Returns [`RiskError::ModelNotFound`] if `path` does not exist; the
    /// in-memory state is untouched on any error
    pub fn restore(&mut self, path: &Path) -> Result<()> {
        let persisted = PersistedModel::read(path)?;
        self.kind = persisted.model_kind;
        self.feature_columns = persisted.feature_columns;
        self.trained_at = Some(persisted.trained_at);
        self.model = persisted.trained.then_some(persisted.model);
        log::info!("Loaded {} model from {}", self.kind, path.display());
        Ok(())
    }

    fn require_trained(&self, operation: &str) -> Result<&FittedModel> {
        self.model.as_ref().ok_or_else(|| {
            RiskError::NotTrained(format!("cannot {operation} with an untrained {} model", self.kind))
        })
    }
}

fn predict_rows(model: &FittedModel, rows: &[Vec<f64>]) -> Prediction {
    let probabilities: Vec<f64> = rows.iter().map(|row| model.predict_proba(row)).collect();
    let labels = probabilities
        .iter()
        .map(|p| u8::from(*p > DECISION_THRESHOLD))
        .collect();
    Prediction {
        labels,
        probabilities,
    }
}
