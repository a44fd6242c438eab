//! Job orchestration error types.

use mvgen_models::{RemoteState, StateTransitionError};
use mvgen_platform::PlatformError;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No input asset was provided")]
    MissingInput,

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Output not ready ({} files visible)", visible.len())]
    OutputNotReady { visible: Vec<String> },

    #[error("Remote job ended in {state}: {message}")]
    RemoteJobFailed { state: RemoteState, message: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} has not been submitted")]
    NotSubmitted(String),

    #[error("Polling was cancelled")]
    PollingCancelled,

    #[error(transparent)]
    InvalidTransition(#[from] StateTransitionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound(job_id.into())
    }

    /// Local I/O failures that the next poll may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::Platform(e) if e.is_transient())
    }

    /// Expected while the remote job is still running.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, JobError::OutputNotReady { .. })
    }
}
