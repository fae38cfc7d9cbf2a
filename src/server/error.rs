//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::{AutomlError, ErrorKind};

#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request that never reached the service
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Automl(#[from] AutomlError),
}

impl ServerError {
    fn status_and_kind(&self) -> (StatusCode, ErrorKind) {
        match self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::Validation),
            ServerError::Automl(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::UnsupportedFormat
                    | ErrorKind::Validation
                    | ErrorKind::UnsupportedTaskType
                    | ErrorKind::TrainingFailure => StatusCode::BAD_REQUEST,
                    ErrorKind::ModelNotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Agent | ErrorKind::Data | ErrorKind::Io | ErrorKind::Serialization => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, kind)
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ServerError::Automl(AutomlError::Io(e)) => {
                tracing::error!(detail = %e, "IO error");
                "A file system error occurred".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::error!(detail = %other, "Internal server error");
                }
                other.to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AutomlError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AutomlError::UnsupportedFormat("x".into()), StatusCode::BAD_REQUEST),
            (AutomlError::TrainingFailure("x".into()), StatusCode::BAD_REQUEST),
            (AutomlError::ModelNotFound("x".into()), StatusCode::NOT_FOUND),
            (AutomlError::Agent("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).into_response().status(), expected);
        }
    }
}
