//! Error types for the BigBox server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bigbox_core::Error as CoreError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Core error.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Request that is well-formed JSON but makes no sense.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: e.to_string(),
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(CoreError::BuildInProgress) => StatusCode::CONFLICT,
            Self::Core(CoreError::ProfileNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Core(CoreError::InvalidProfile(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body. Pipeline failures keep the terse bodies the UI expects;
    /// the detail already went out as a log line.
    fn body(&self) -> String {
        match self {
            Self::Core(CoreError::BusyConflict) => "Error.".to_string(),
            Self::Core(
                CoreError::BuildInProgress
                | CoreError::ProfileNotFound { .. }
                | CoreError::InvalidProfile(_),
            )
            | Self::BadRequest(_) => self.to_string(),
            _ => "Error".to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, self.body()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::from(CoreError::BusyConflict).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::from(CoreError::BuildInProgress).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(CoreError::ProfileNotFound {
                id: "x".to_string(),
                is_default: true,
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(CoreError::InvalidProfile("dup".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(CoreError::FlashFailure { code: Some(1) }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_failure_bodies() {
        assert_eq!(ServerError::from(CoreError::BusyConflict).body(), "Error.");
        assert_eq!(
            ServerError::from(CoreError::BuildFailure {
                artifact: PathBuf::from("/tmp/Marlin.hex"),
            })
            .body(),
            "Error"
        );
        assert_eq!(
            ServerError::from(CoreError::BuildInProgress).body(),
            "a build is already in progress"
        );
    }
}
