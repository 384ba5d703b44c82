//! Error types for the bonehealth pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RiskError>;

/// Main error type for the risk-prediction pipeline
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("input columns do not match training columns after reindexing")]
    SchemaMismatch {
        input_columns: Vec<String>,
        training_columns: Vec<String>,
    },

    #[error("SHAP shape mismatch: shap_arr={contributions_len}, columns={column_count}")]
    AttributionShapeMismatch {
        contributions_len: usize,
        column_count: usize,
        columns: Vec<String>,
        contributions: Vec<f64>,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for RiskError {
    fn from(err: polars::error::PolarsError) -> Self {
        RiskError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        RiskError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RiskError {
    fn from(err: ndarray::ShapeError) -> Self {
        RiskError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RiskError::DataUnavailable("dataset is empty".to_string());
        assert_eq!(err.to_string(), "Data unavailable: dataset is empty");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RiskError = io_err.into();
        assert!(matches!(err, RiskError::IoError(_)));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = RiskError::AttributionShapeMismatch {
            contributions_len: 8,
            column_count: 4,
            columns: vec![],
            contributions: vec![],
        };
        assert!(err.to_string().contains("shap_arr=8"));
    }
}
