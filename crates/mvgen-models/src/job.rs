//! Job definitions and the local job lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::slot::JobHandle;
use crate::status::RemoteState;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight alphanumeric characters, used to derive per-job slot slugs.
    pub fn short(&self) -> String {
        self.0
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect::<String>()
            .to_lowercase()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// User-supplied generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobParams {
    /// Title of the generated video
    #[validate(length(min = 1, max = 120))]
    pub title: String,

    /// Requested visual style, embedded in every scene prompt
    #[validate(length(min = 1, max = 200))]
    pub visual_style: String,

    /// Target length of each generated clip in seconds
    #[validate(range(min = 1, max = 120))]
    pub clip_duration_seconds: u32,
}

/// Name of the parameter file uploaded into the input slot.
pub const PARAMETERS_FILE: &str = "parameters.json";

/// Typed parameter record handed to the remote runner.
///
/// Uploaded as [`PARAMETERS_FILE`] next to the audio in the input slot; user
/// text is never spliced into the executable payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobParameters {
    pub title: String,
    pub visual_style: String,
    pub clip_duration_seconds: u32,
    /// Seed for the prompt chainer's anchor selection
    pub prompt_seed: u64,
    /// Frame rate used to size each generation request
    pub frames_per_second: u32,
    /// `owner/slug` of the input slot the job reads from
    pub input_slot: String,
    /// File name of the audio inside the input slot
    pub input_file: String,
    /// Suffix marking the finished artifact among the job outputs
    pub artifact_suffix: String,
}

/// Reference to the uploaded audio bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InputAssetRef {
    /// Original file name
    pub file_name: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// MIME content type
    pub content_type: String,
    /// Hex-encoded SHA-256 of the bytes
    pub sha256: String,
}

/// Local lifecycle state of a job.
///
/// States advance strictly forward. `Failed` and `Cancelled` are reachable
/// from any non-terminal state, and `Queued`/`Running` may be reported
/// repeatedly by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Uploading,
    Submitted,
    Queued,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Uploading => "uploading",
            JobState::Submitted => "submitted",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::Failed | JobState::Cancelled
        )
    }

    /// Position along the forward path. Terminal failures sit past the end.
    fn rank(&self) -> u8 {
        match self {
            JobState::Created => 0,
            JobState::Uploading => 1,
            JobState::Submitted => 2,
            JobState::Queued => 3,
            JobState::Running => 4,
            JobState::Complete => 5,
            JobState::Failed | JobState::Cancelled => 6,
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, JobState::Failed | JobState::Cancelled) => true,
            (JobState::Queued | JobState::Running, JobState::Queued | JobState::Running) => true,
            (current, next) => next.rank() > current.rank(),
        }
    }

    /// Local state implied by a remote platform state, if any.
    pub fn from_remote(remote: &RemoteState) -> Option<JobState> {
        match remote {
            RemoteState::Queued => Some(JobState::Queued),
            RemoteState::Running => Some(JobState::Running),
            RemoteState::Complete => Some(JobState::Complete),
            RemoteState::Error => Some(JobState::Failed),
            RemoteState::Cancelled => Some(JobState::Cancelled),
            RemoteState::Unknown(_) => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid job state transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// The unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Generation parameters
    #[serde(flatten)]
    pub params: JobParams,

    /// Uploaded audio reference
    pub input_asset: InputAssetRef,

    /// Lifecycle state
    #[serde(default)]
    pub state: JobState,

    /// Remote handle, assigned once at submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_handle: Option<JobHandle>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When both slots were pushed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,

    /// When a terminal state was first observed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Error message (if failed or cancelled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    /// Create a new job in the `Created` state.
    pub fn new(params: JobParams, input_asset: InputAssetRef) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            params,
            input_asset,
            state: JobState::Created,
            remote_handle: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            finished_at: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`, enforcing the lifecycle ordering.
    ///
    /// Re-reporting the current `Queued`/`Running` state is accepted and only
    /// bumps `updated_at`.
    pub fn transition(&mut self, next: JobState) -> Result<(), StateTransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(StateTransitionError {
                from: self.state,
                to: next,
            });
        }

        let now = Utc::now();
        if next == JobState::Submitted {
            self.submitted_at = Some(now);
        }
        if next.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(now);
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Record the remote handle. The first assignment wins.
    pub fn assign_handle(&mut self, handle: JobHandle) {
        if self.remote_handle.is_none() {
            self.remote_handle = Some(handle);
            self.updated_at = Utc::now();
        }
    }

    /// Mark the job failed with a message, if it is not already terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.transition(JobState::Failed).is_ok() {
            self.error_message = Some(error.into());
        }
    }
}
