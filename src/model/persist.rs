//! On-disk form of a trained model.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::forest::RandomForest;
use super::logistic::LogisticRegression;
use crate::config::ModelKind;
use crate::error::{Result, RiskError};

/// The fitted estimator behind a [`super::RiskModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedModel {
    /// Random forest classifier
    RandomForest(RandomForest),
    /// Logistic regression classifier
    Logistic(LogisticRegression),
}

impl FittedModel {
    /// Kind tag matching the estimator
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::Logistic(_) => ModelKind::Logistic,
        }
    }

    /// Positive-class probability for an aligned feature row
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        match self {
            Self::RandomForest(forest) => forest.predict_proba(row),
            Self::Logistic(logistic) => logistic.predict_proba(row),
        }
    }
}

/// Everything needed to restore a model for inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub model_kind: ModelKind,
    pub model: FittedModel,
    pub feature_columns: Vec<String>,
    pub trained: bool,
    pub trained_at: DateTime<Utc>,
}

impl PersistedModel {
    /// Write pretty JSON, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a model written by [`Self::write`]
    ///
    /// # Errors
    /// [`RiskError::ModelNotFound`] if nothing exists at `path`,
    /// [`RiskError::Serialization`] if the file is not a persisted model, and
    /// [`RiskError::InvalidData`] if the kind tag disagrees with the estimator
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RiskError::ModelNotFound(path.display().to_string()));
        }
        let persisted: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        if persisted.model.kind() != persisted.model_kind {
            return Err(RiskError::InvalidData(format!(
                "{} declares {} but holds a {} estimator",
                path.display(),
                persisted.model_kind,
                persisted.model.kind()
            )));
        }
        Ok(persisted)
    }
}
