//! Error types for the AutoML agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for AutoML agent operations
pub type Result<T> = std::result::Result<T, AutomlError>;

/// Main error type.
///
/// The first five variants form the user-facing taxonomy; their `Display`
/// output is exactly the message returned to callers.
#[derive(Error, Debug)]
pub enum AutomlError {
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    UnsupportedTaskType(String),

    #[error("{0}")]
    ModelNotFound(String),

    #[error("{0}")]
    TrainingFailure(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Discriminant of [`AutomlError`] that callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    Validation,
    UnsupportedTaskType,
    ModelNotFound,
    TrainingFailure,
    Agent,
    Data,
    Io,
    Serialization,
}

impl AutomlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomlError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            AutomlError::Validation(_) => ErrorKind::Validation,
            AutomlError::UnsupportedTaskType(_) => ErrorKind::UnsupportedTaskType,
            AutomlError::ModelNotFound(_) => ErrorKind::ModelNotFound,
            AutomlError::TrainingFailure(_) => ErrorKind::TrainingFailure,
            AutomlError::Agent(_) => ErrorKind::Agent,
            AutomlError::Data(_) => ErrorKind::Data,
            AutomlError::Io(_) => ErrorKind::Io,
            AutomlError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Rebuild an error from its kind and message, e.g. from a tagged JSON error.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::UnsupportedFormat => AutomlError::UnsupportedFormat(message),
            ErrorKind::Validation => AutomlError::Validation(message),
            ErrorKind::UnsupportedTaskType => AutomlError::UnsupportedTaskType(message),
            ErrorKind::ModelNotFound => AutomlError::ModelNotFound(message),
            ErrorKind::Agent => AutomlError::Agent(message),
            ErrorKind::Data => AutomlError::Data(message),
            ErrorKind::Io => AutomlError::Io(std::io::Error::new(std::io::ErrorKind::Other, message)),
            ErrorKind::Serialization => AutomlError::Serialization(message),
            ErrorKind::TrainingFailure => AutomlError::TrainingFailure(message),
        }
    }

    /// Whether the error belongs to the caller-facing taxonomy.
    pub fn is_taxonomy(&self) -> bool {
        matches!(
            self,
            AutomlError::UnsupportedFormat(_)
                | AutomlError::Validation(_)
                | AutomlError::UnsupportedTaskType(_)
                | AutomlError::ModelNotFound(_)
                | AutomlError::TrainingFailure(_)
        )
    }

    /// Collapse plumbing errors into `TrainingFailure`, keeping the message.
    pub fn into_training_failure(self) -> Self {
        if self.is_taxonomy() {
            self
        } else {
            AutomlError::TrainingFailure(self.to_string())
        }
    }

    /// JSON shape used when an error travels as a tool output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        })
    }
}

impl From<polars::error::PolarsError> for AutomlError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutomlError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for AutomlError {
    fn from(err: serde_json::Error) -> Self {
        AutomlError::Serialization(err.to_string())
    }
}

impl From<calamine::Error> for AutomlError {
    fn from(err: calamine::Error) -> Self {
        AutomlError::Data(format!("Error converting Excel to CSV: {}", err))
    }
}

impl From<ndarray::ShapeError> for AutomlError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutomlError::Data(format!("invalid shape: {}", err))
    }
}
