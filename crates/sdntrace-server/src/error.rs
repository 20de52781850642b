//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It implements
//! `axum::response::IntoResponse` to produce structured JSON error responses
//! with appropriate HTTP status codes.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use sdntrace_core::TraceError;

use crate::clients::CollaboratorError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    pub message: String,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Flow pipeline contradicts itself (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator could not serve the data a request depends on (424).
    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "PIPELINE_CONFLICT"),
            ApiError::DependencyFailed(_) => (StatusCode::FAILED_DEPENDENCY, "DEPENDENCY_FAILED"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::DependencyFailed(msg)
            | ApiError::InternalError(msg) => msg.clone(),
        };

        let body = serde_json::json!({
            "success": false,
            "error": ApiErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        match &err {
            TraceError::Malformed { .. } => ApiError::BadRequest(err.to_string()),
            TraceError::PipelineRegression { .. } => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<CollaboratorError> for ApiError {
    fn from(err: CollaboratorError) -> Self {
        ApiError::DependencyFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdntrace_core::Dpid;

    #[test]
    fn trace_errors_map_to_client_statuses() {
        let malformed: ApiError = TraceError::malformed("missing dpid").into();
        assert_eq!(malformed.status_and_code().0, StatusCode::BAD_REQUEST);

        let regression: ApiError = TraceError::PipelineRegression {
            dpid: Dpid::from("00:00:00:00:00:00:00:01"),
            from: 2,
            to: 1,
        }
        .into();
        assert_eq!(regression.status_and_code().0, StatusCode::CONFLICT);
    }

    #[test]
    fn collaborator_errors_are_failed_dependencies() {
        let err: ApiError = CollaboratorError::Unavailable {
            service: "flow store",
            reason: "timed out".to_string(),
        }
        .into();
        assert_eq!(err.status_and_code().0, StatusCode::FAILED_DEPENDENCY);
        assert_eq!(err.into_response().status(), StatusCode::FAILED_DEPENDENCY);
    }
}
