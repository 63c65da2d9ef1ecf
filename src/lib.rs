//! A Rust library for identifying at-risk students from tabular performance
//! records: cleaning, feature engineering, labelling, classification,
//! explanation and class-level summaries.

pub mod cleaning;
pub mod config;
pub mod dataset;
pub mod error;
pub mod explain;
pub mod features;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod reader;
pub mod summary;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{ImputationSource, ModelKind, PipelineConfig, UnseenCategoryPolicy};
pub use dataset::{Dataset, StudentRecord, Value};
pub use error::{Result, RiskError};

// Pipeline stages
pub use cleaning::{CleanerState, DataCleaner};
pub use explain::{Explainer, Explanation, RiskLevel};
pub use features::{FeatureEngineer, FeatureReport, FeatureSet, Label, MarkColumns};
pub use labels::{LabelOutcome, RiskLabeler};
pub use model::{Prediction, PredictionResult, RiskModel, TrainingMetrics};
pub use summary::{ClassSummary, summarize};

// Orchestration
pub use pipeline::{Assessment, RiskPipeline, StudentAssessment, assessments_to_batch};

// Table IO
pub use reader::{LoaderOptions, add_student_ids, load_table, read_csv, read_parquet, write_csv};

// Arrow types
pub use arrow::record_batch::RecordBatch;
