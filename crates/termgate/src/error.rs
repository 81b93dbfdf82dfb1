//! API error types and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use termgate_exec::ExecError;

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Protocol-level errors surfaced to the caller as JSON.
///
/// Execution outcomes (non-zero exit, timeout, truncated output) are NOT
/// errors at this level; they travel in-band in the exec response body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed Authorization header.
    #[error("unauthorized")]
    Unauthorized,

    /// A bearer token was presented but does not match the secret.
    #[error("forbidden")]
    Forbidden,

    /// The request body was invalid or the command was inadmissible.
    #[error("{0}")]
    BadRequest(String),

    /// Whitelist enforcement rejected the command.
    #[error("command is not on the whitelist")]
    NotWhitelisted,

    /// The suggestion upstream could not be reached or answered with an
    /// error.
    #[error("failed to contact the suggestion API")]
    Upstream(String),

    /// Anything that prevented running the request at all.
    #[error("{0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("unauthorized"))
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, ErrorResponse::new("forbidden")),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorResponse::new(message)),
            ApiError::NotWhitelisted => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("command is not on the whitelist"),
            ),
            ApiError::Upstream(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::with_details("failed to contact the suggestion API", details),
            ),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(message))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::InvalidInput(_) | ExecError::ForbiddenChars => {
                ApiError::BadRequest(err.to_string())
            }
            ExecError::NotWhitelisted => ApiError::NotWhitelisted,
            ExecError::Spawn { .. }
            | ExecError::CommandFailed { .. }
            | ExecError::BadPattern(_)
            | ExecError::Io(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_map_to_statuses() {
        let e: ApiError = ExecError::ForbiddenChars.into();
        assert!(matches!(e, ApiError::BadRequest(_)));

        let e: ApiError = ExecError::NotWhitelisted.into();
        assert!(matches!(e, ApiError::NotWhitelisted));

        let e: ApiError = ExecError::Spawn {
            program: "docker".into(),
            message: "not found".into(),
        }
        .into();
        assert!(matches!(e, ApiError::Internal(_)));
    }
}
