//! Error handling for the risk assessment pipeline.

use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for the risk pipeline
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// A column required by an operation is missing or has the wrong shape
    #[error("Schema error: {0}")]
    Schema(String),

    /// Prediction or persistence was requested before the model was trained or restored
    #[error("Model is not trained: {0}")]
    NotTrained(String),

    /// `transform` was called on a cleaner that has never been fitted
    #[error("Data cleaner has not been fitted; call fit_transform first")]
    NotFitted,

    /// No persisted model exists at the requested location
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// A categorical value was not observed while fitting the encoding
    #[error("Unseen category {value:?} in column {column}")]
    UnseenCategory {
        /// Column holding the value
        column: String,
        /// The value that has no code
        value: String,
    },

    /// An argument is outside its valid range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A data cell cannot be used numerically (missing, NaN or infinite)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The file extension is not one the loader understands
    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    /// Error opening, reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error building or casting Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error reading Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error encoding or decoding a persisted model
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error converting typed rows to Arrow
    #[error("Conversion error: {0}")]
    Conversion(String),
}

impl From<serde_arrow::Error> for RiskError {
    fn from(error: serde_arrow::Error) -> Self {
        Self::Conversion(error.to_string())
    }
}

/// Result type for risk pipeline operations
pub type Result<T> = std::result::Result<T, RiskError>;
