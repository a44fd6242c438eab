//! Structured per-job logging.

use tracing::{error, info, warn, Span};

use mvgen_models::JobId;

/// Logs job lifecycle events with the job ID and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn started(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "{} started: {}", self.operation, message
        );
    }

    pub fn progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "{}: {}", self.operation, message
        );
    }

    pub fn warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "{} warning: {}", self.operation, message
        );
    }

    pub fn failed(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "{} failed: {}", self.operation, message
        );
    }

    pub fn finished(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "{} finished: {}", self.operation, message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job ID and operation, for instrumenting futures.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
