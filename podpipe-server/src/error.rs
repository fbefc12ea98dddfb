//! Error types for podpipe-server
//!
//! Two layers: `ApiError` covers the HTTP boundary (bad requests, internal
//! failures) and maps onto status codes; `PipelineError` is the pipeline's
//! own taxonomy, surfaced to the caller as a terminal `Failed` event rather
//! than an HTTP status once the stream has started.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// podpipe-common error
    #[error("Common error: {0}")]
    Common(#[from] podpipe_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure taxonomy for the publishing pipeline.
///
/// Every variant is fatal for the job; there are no retries. `Upload` and
/// `Publish` carry the upstream service's error text separately so the
/// terminal event can report both the phase and the upstream cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Credentials absent; rejected before any external call
    #[error("Credentials not configured. Please configure credentials first.")]
    Config,

    /// Bad or missing submission input; rejected before any external call
    #[error("{0}")]
    Validation(String),

    /// External audio transform exited non-zero or is unavailable
    #[error("Audio processing failed: {0}")]
    Transform(String),

    /// Remote storage login or transfer failed
    #[error("Failed to upload to file storage: {message}")]
    Upload {
        message: String,
        detail: Option<String>,
    },

    /// Draft post creation failed
    #[error("Failed to create draft post: {message}")]
    Publish {
        message: String,
        detail: Option<String>,
    },

    /// Local filesystem failure while staging job files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Upstream-provided detail, where the failure originated upstream
    pub fn detail(&self) -> Option<&str> {
        match self {
            PipelineError::Upload { detail, .. } | PipelineError::Publish { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }
}
