//! End-to-end training and assessment over caller-owned state.
//!
//! A [`RiskPipeline`] owns the cleaner and the model. Training mutates both;
//! assessment only reads them.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use arrow_schema::FieldRef;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::cleaning::DataCleaner;
use crate::config::{PipelineConfig, TARGET_COLUMN};
use crate::dataset::Dataset;
use crate::error::{Result, RiskError};
use crate::explain::{Explainer, RiskLevel};
use crate::features::{FeatureEngineer, prepare_for_training};
use crate::labels::RiskLabeler;
use crate::model::{PredictionResult, RiskModel, TrainingMetrics};
use crate::reader::{ID_COLUMNS, add_student_ids};
use crate::summary::ClassSummary;
use crate::utils::{log_operation_complete, log_operation_start};

/// File name of the persisted cleaner state inside a model directory
pub const CLEANER_STATE_FILE: &str = "cleaner_state.json";

/// Separator used when list fields are flattened into one text cell
pub const LIST_SEPARATOR: &str = "; ";

/// Prediction and explanation for one student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAssessment {
    /// Identifier as it appeared in the input, or the generated row number
    pub student_id: String,
    pub prediction: u8,
    pub is_at_risk: bool,
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    pub explanation: String,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Results of assessing a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// One entry per input row, in input order
    pub results: Vec<StudentAssessment>,
    pub summary: ClassSummary,
}

/// Flat row layout used for tabular export
#[derive(Debug, Serialize, Deserialize)]
struct AssessmentRow {
    student_id: String,
    prediction: u8,
    is_at_risk: bool,
    risk_probability: f64,
    risk_level: String,
    explanation: String,
    risk_factors: String,
    recommendations: String,
}

impl From<&StudentAssessment> for AssessmentRow {
    fn from(assessment: &StudentAssessment) -> Self {
        Self {
            student_id: assessment.student_id.clone(),
            prediction: assessment.prediction,
            is_at_risk: assessment.is_at_risk,
            risk_probability: assessment.risk_probability,
            risk_level: assessment.risk_level.to_string(),
            explanation: assessment.explanation.clone(),
            risk_factors: assessment.risk_factors.join(LIST_SEPARATOR),
            recommendations: assessment.recommendations.join(LIST_SEPARATOR),
        }
    }
}

/// Convert assessments to an Arrow record batch
///
/// List fields are joined with `"; "`.
pub fn assessments_to_batch(assessments: &[StudentAssessment]) -> Result<RecordBatch> {
    let rows: Vec<AssessmentRow> = assessments.iter().map(AssessmentRow::from).collect();
    let fields = Vec::<FieldRef>::from_type::<AssessmentRow>(TracingOptions::default())?;
    Ok(serde_arrow::to_record_batch(&fields, &rows)?)
}

/// Path of the persisted model for a model kind inside `dir`
#[must_use]
pub fn model_path(dir: &Path, config: &PipelineConfig) -> PathBuf {
    dir.join(format!("{}_model.json", config.model_kind))
}

/// Cleaner, feature engineering, labelling and model wired together
#[derive(Debug, Clone)]
pub struct RiskPipeline {
    config: PipelineConfig,
    cleaner: DataCleaner,
    model: RiskModel,
}

impl RiskPipeline {
    /// An untrained pipeline
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidInput`] if the configuration is out of range
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cleaner: DataCleaner::from_config(&config),
            model: RiskModel::from_config(&config),
            config,
        })
    }

    /// Restore a pipeline saved with [`Self::save`]
    ///
    /// The model is read from `<dir>/<model_kind>_model.json` for the
    /// configured kind.
    pub fn load(dir: &Path, config: PipelineConfig) -> Result<Self> {
        let mut pipeline = Self::new(config)?;
        pipeline.model.restore(&model_path(dir, &pipeline.config))?;
        pipeline.cleaner.load_state(&dir.join(CLEANER_STATE_FILE))?;
        Ok(pipeline)
    }

    /// Persist the model and the cleaner state into `dir`
    ///
    /// # Errors
    /// Returns [`RiskError::NotTrained`] for an untrained pipeline
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.model.persist(&model_path(dir, &self.config))?;
        self.cleaner.save_state(&dir.join(CLEANER_STATE_FILE))
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub const fn model(&self) -> &RiskModel {
        &self.model
    }

    #[must_use]
    pub const fn cleaner(&self) -> &DataCleaner {
        &self.cleaner
    }

    /// Whether [`Self::assess`] can run
    #[must_use]
    pub const fn is_trained(&self) -> bool {
        self.model.is_trained() && self.cleaner.is_fitted()
    }

    /// Clean, engineer, label and train on a raw table
    ///
    /// # Errors
    /// Returns [`RiskError::Schema`] if the table has no mark columns to label
    /// from, plus any error of the individual stages
    pub fn train(&mut self, dataset: Dataset) -> Result<TrainingMetrics> {
        let start = Instant::now();
        log_operation_start("training pipeline on", &format_args!("{} rows", dataset.num_rows()));

        let dataset = add_student_ids(dataset)?;
        let mut cleaner = DataCleaner::from_config(&self.config);
        let dataset = cleaner.fit_transform(dataset)?;
        let dataset = FeatureEngineer::new().derive(dataset)?;
        let (dataset, outcome) = RiskLabeler::new(self.config.risk_threshold).label(dataset)?;
        if !outcome.is_labelled() {
            return Err(RiskError::Schema(
                "cannot derive at-risk labels without at least two mark or score columns"
                    .to_string(),
            ));
        }
        let dataset = if self.config.normalize {
            cleaner.fit_normalization(dataset)?
        } else {
            dataset
        };

        let (features, labels) = prepare_for_training(&dataset, TARGET_COLUMN)?;
        let labels = labels.ok_or_else(|| RiskError::Schema(format!("{TARGET_COLUMN} missing")))?;
        let mut model = RiskModel::from_config(&self.config);
        let metrics = model.train(&features, &labels)?;

        self.cleaner = cleaner;
        self.model = model;
        log_operation_complete(
            "trained on",
            &format_args!("{} pipeline", self.config.model_kind),
            features.num_rows(),
            Some(start.elapsed()),
        );
        Ok(metrics)
    }

    /// Predict, explain and summarise every row of a raw table
    ///
    /// # Errors
    /// Returns [`RiskError::NotTrained`] or [`RiskError::NotFitted`] before
    /// training or loading
    pub fn assess(&self, dataset: Dataset) -> Result<Assessment> {
        let start = Instant::now();
        let dataset = add_student_ids(dataset)?;
        let student_ids = student_ids(&dataset)?;

        let dataset = self.cleaner.transform(dataset)?;
        let engineered = FeatureEngineer::new().derive(dataset)?;
        let scaled = if self.cleaner.state().normalization.is_some() {
            self.cleaner.normalize(engineered.clone())?
        } else {
            engineered.clone()
        };

        let (features, _) = prepare_for_training(&scaled, TARGET_COLUMN)?;
        let prediction = self.model.predict(&features)?;
        let records = engineered.records()?;

        let explainer = Explainer::new();
        let results: Vec<StudentAssessment> = prediction
            .results()
            .zip(records.iter())
            .zip(student_ids)
            .map(|((result, record), student_id)| {
                let explanation = explainer.explain(record, &result);
                StudentAssessment {
                    student_id,
                    prediction: result.prediction,
                    is_at_risk: result.is_at_risk,
                    risk_probability: result.risk_probability,
                    risk_level: explanation.risk_level,
                    explanation: explanation.explanation,
                    risk_factors: explanation.risk_factors,
                    recommendations: explanation.recommendations,
                }
            })
            .collect();

        let predictions: Vec<PredictionResult> = prediction.results().collect();
        let summary = ClassSummary::summarize(&predictions);
        log_operation_complete("assessed", &"input table", results.len(), Some(start.elapsed()));
        Ok(Assessment { results, summary })
    }

    /// Assess a table, first training on it if the model is untrained
    ///
    /// Training only happens when the labelled batch holds both classes.
    ///
    /// # Errors
    /// Returns [`RiskError::NotTrained`] if the model is untrained and the
    /// batch cannot be used to train it
    pub fn assess_or_train(&mut self, dataset: Dataset) -> Result<Assessment> {
        if !self.is_trained() {
            if !has_both_classes(&dataset, self.config.risk_threshold)? {
                return Err(RiskError::NotTrained(
                    "the batch does not contain both at-risk and not-at-risk students".to_string(),
                ));
            }
            self.train(dataset.clone())?;
        }
        self.assess(dataset)
    }
}

/// Identifier text for each row, taken before cleaning encodes it
fn student_ids(dataset: &Dataset) -> Result<Vec<String>> {
    match ID_COLUMNS.iter().find(|name| dataset.has_column(name)) {
        Some(name) => Ok(dataset
            .text_values(name)?
            .into_iter()
            .enumerate()
            .map(|(idx, id)| id.unwrap_or_else(|| (idx + 1).to_string()))
            .collect()),
        None => Ok((1..=dataset.num_rows()).map(|id| id.to_string()).collect()),
    }
}

/// Whether labelling a raw batch would produce both classes
fn has_both_classes(dataset: &Dataset, threshold: f64) -> Result<bool> {
    let mut cleaner = DataCleaner::new();
    let cleaned = cleaner.fit_transform(dataset.clone())?;
    let engineered = FeatureEngineer::new().derive(cleaned)?;
    let (labelled, outcome) = RiskLabeler::new(threshold).label(engineered)?;
    if !outcome.is_labelled() {
        return Ok(false);
    }
    let labels = labelled.numeric_values(TARGET_COLUMN)?;
    let positives = labels.iter().flatten().filter(|v| **v == 1.0).count();
    Ok(positives > 0 && positives < labels.len())
}
