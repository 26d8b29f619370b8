//! Error types for the churn pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Main error type for the churn pipeline
#[derive(Error, Debug)]
pub enum ChurnError {
    /// Required column absent, wrong type, or unexpected cardinality
    #[error("Schema error: {0}")]
    Schema(String),

    /// Unconvertible or missing values the configuration does not tolerate
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Unknown model type, invalid proportions, out-of-range hyperparameters
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Unseen category '{value}' in column '{column}'")]
    UnseenCategory { column: String, value: String },

    #[error("Artifact mismatch: model tag {model_tag} does not match preprocessor tag {preprocessor_tag}")]
    ArtifactMismatch {
        model_tag: String,
        preprocessor_tag: String,
    },

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}

impl ChurnError {
    /// Whether the error stems from caller-supplied data rather than the
    /// process environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ChurnError::Schema(_)
                | ChurnError::DataIntegrity(_)
                | ChurnError::UnseenCategory { .. }
                | ChurnError::Shape { .. }
        )
    }
}

impl From<polars::error::PolarsError> for ChurnError {
    fn from(err: polars::error::PolarsError) -> Self {
        ChurnError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        ChurnError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChurnError {
    fn from(err: serde_yaml::Error) -> Self {
        ChurnError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ChurnError {
    fn from(err: ndarray::ShapeError) -> Self {
        ChurnError::Shape {
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
        let err = ChurnError::Schema("missing column 'Churn'".to_string());
        assert_eq!(err.to_string(), "Schema error: missing column 'Churn'");

        let err = ChurnError::UnseenCategory {
            column: "Contract".to_string(),
            value: "Three year".to_string(),
        };
        assert_eq!(err.to_string(), "Unseen category 'Three year' in column 'Contract'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChurnError = io_err.into();
        assert!(matches!(err, ChurnError::Io(_)));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_input_errors() {
        assert!(ChurnError::DataIntegrity("x".into()).is_input_error());
        assert!(!ChurnError::NotFitted.is_input_error());
        assert!(!ChurnError::Config("x".into()).is_input_error());
    }
}
