//! Remote status mapping and UI status snapshots.
//!
//! The platform reports its own execution states; this module maps them onto
//! the small UI-facing stage enumeration. A [`StatusSnapshot`] is rebuilt from
//! scratch on every poll and never patched in place.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state as reported by the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteState {
    Queued,
    Running,
    Complete,
    Error,
    Cancelled,
    /// Any state string the platform adds later
    Unknown(String),
}

impl RemoteState {
    /// Parse a platform state string, case-insensitively.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => RemoteState::Queued,
            "running" => RemoteState::Running,
            "complete" | "completed" => RemoteState::Complete,
            "error" | "failed" => RemoteState::Error,
            "cancelled" | "canceled" | "cancelrequested" | "cancelacknowledged" => {
                RemoteState::Cancelled
            }
            _ => RemoteState::Unknown(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RemoteState::Queued => "queued",
            RemoteState::Running => "running",
            RemoteState::Complete => "complete",
            RemoteState::Error => "error",
            RemoteState::Cancelled => "cancelled",
            RemoteState::Unknown(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteState::Complete | RemoteState::Error | RemoteState::Cancelled
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RemoteState::Error | RemoteState::Cancelled)
    }
}

impl From<String> for RemoteState {
    fn from(s: String) -> Self {
        RemoteState::parse(&s)
    }
}

impl From<RemoteState> for String {
    fn from(state: RemoteState) -> Self {
        state.as_str().to_string()
    }
}

impl JsonSchema for RemoteState {
    fn schema_name() -> String {
        "RemoteState".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-facing processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UiStage {
    /// Waiting for or running audio analysis
    Analysis,
    /// Generating clips
    Clips,
    /// Finished artifact available
    Done,
    Error,
    Cancelled,
}

impl UiStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiStage::Analysis => "analysis",
            UiStage::Clips => "clips",
            UiStage::Done => "done",
            UiStage::Error => "error",
            UiStage::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UiStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress reported while the platform has accepted the job but not started it.
pub const PROGRESS_QUEUED: u8 = 5;
/// Progress reported for a state string the mapping does not recognise.
pub const PROGRESS_UNKNOWN: u8 = 2;
/// Progress reported while the remote job is executing.
pub const PROGRESS_RUNNING: u8 = 50;
pub const PROGRESS_COMPLETE: u8 = 100;

/// Point-in-time view of a job's remote status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot {
    /// Raw remote state
    pub remote_state: RemoteState,
    /// Mapped UI stage
    pub ui_stage: UiStage,
    /// Coarse progress percentage (0-100)
    pub progress_percent: u8,
    /// True once the remote job reached a terminal state
    pub done: bool,
    /// True when the terminal state is a failure
    pub errored: bool,
    /// Diagnostic message for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Where the finished artifact can be fetched (complete only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// When the job was submitted, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal state was first observed, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Build a snapshot from the current remote state.
    ///
    /// `download_url` is only kept for `Complete`; `failure_message` is only
    /// kept for failure states, falling back to a generic message.
    pub fn from_remote(
        remote_state: RemoteState,
        failure_message: Option<String>,
        download_url: Option<String>,
    ) -> Self {
        let (ui_stage, progress_percent) = match &remote_state {
            RemoteState::Queued => (UiStage::Analysis, PROGRESS_QUEUED),
            RemoteState::Unknown(_) => (UiStage::Analysis, PROGRESS_UNKNOWN),
            RemoteState::Running => (UiStage::Clips, PROGRESS_RUNNING),
            RemoteState::Complete => (UiStage::Done, PROGRESS_COMPLETE),
            RemoteState::Error => (UiStage::Error, 0),
            RemoteState::Cancelled => (UiStage::Cancelled, 0),
        };

        let failure_message = failure_message.filter(|m| !m.trim().is_empty());
        let error_message = match &remote_state {
            RemoteState::Error => {
                Some(failure_message.unwrap_or_else(|| "Remote job failed".to_string()))
            }
            RemoteState::Cancelled => {
                Some(failure_message.unwrap_or_else(|| "Remote job was cancelled".to_string()))
            }
            _ => None,
        };

        let download_url = match &remote_state {
            RemoteState::Complete => download_url,
            _ => None,
        };

        Self {
            done: remote_state.is_terminal(),
            errored: remote_state.is_failure(),
            remote_state,
            ui_stage,
            progress_percent,
            error_message,
            download_url,
            started_at: None,
            finished_at: None,
        }
    }

    /// Attach the caller-tracked timestamps.
    pub fn with_timestamps(
        mut self,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self
    }
}
