//! Error types for the crop yield pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, YieldError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum YieldError {
    #[error("Dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Missing column '{column}': {detail}")]
    MissingColumn { column: String, detail: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Feature '{column}' has zero variance in the training partition")]
    ZeroVariance { column: String },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl YieldError {
    /// Shorthand for a missing-column error
    pub fn missing_column(column: impl Into<String>, detail: impl Into<String>) -> Self {
        YieldError::MissingColumn {
            column: column.into(),
            detail: detail.into(),
        }
    }
}

impl From<polars::error::PolarsError> for YieldError {
    fn from(err: polars::error::PolarsError) -> Self {
        YieldError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for YieldError {
    fn from(err: serde_json::Error) -> Self {
        YieldError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for YieldError {
    fn from(err: ndarray::ShapeError) -> Self {
        YieldError::ShapeError {
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
        let err = YieldError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_missing_column_display() {
        let err = YieldError::missing_column("Mes", "'Ano-Mes' not available either");
        assert_eq!(
            err.to_string(),
            "Missing column 'Mes': 'Ano-Mes' not available either"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: YieldError = io_err.into();
        assert!(matches!(err, YieldError::IoError(_)));
    }
}
