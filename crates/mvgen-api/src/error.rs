//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mvgen_jobs::JobError;
use mvgen_platform::PlatformError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Output is not ready yet")]
    OutputNotReady { files: Vec<String> },

    /// The remote job ended without an artifact; retrying will not help.
    #[error("Remote job ended in {state}: {message}")]
    JobFailed { state: String, message: String },

    #[error("Remote platform returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Remote platform error: {0}")]
    Platform(PlatformError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) | ApiError::OutputNotReady { .. } | ApiError::JobFailed { .. } => {
                StatusCode::CONFLICT
            }
            ApiError::Upstream { .. } | ApiError::Platform(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::OutputNotReady { .. } => "output_not_ready",
            ApiError::JobFailed { .. } => "remote_job_failed",
            ApiError::Upstream { .. } | ApiError::Platform(_) => "upstream_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Validation(msg) => ApiError::Validation(msg),
            JobError::MissingInput => ApiError::bad_request("An audio file is required"),
            JobError::Platform(PlatformError::RemoteStatus { status, body }) => {
                ApiError::Upstream { status, body }
            }
            JobError::Platform(e) => ApiError::Platform(e),
            JobError::OutputNotReady { visible } => ApiError::OutputNotReady { files: visible },
            JobError::JobNotFound(id) => ApiError::not_found(format!("Job {}", id)),
            JobError::RemoteJobFailed { state, message } => ApiError::JobFailed {
                state: state.to_string(),
                message,
            },
            e @ JobError::NotSubmitted(_) => ApiError::conflict(e.to_string()),
            e => ApiError::internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = Some(self.code().to_string());

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let (files, state) = match self {
            ApiError::OutputNotReady { files } => (Some(files), None),
            ApiError::JobFailed { state, .. } => (None, Some(state)),
            _ => (None, None),
        };

        let body = ErrorResponse {
            detail,
            code,
            files,
            state,
        };

        (status, Json(body)).into_response()
    }
}
