//! Platform error types.

use std::fmt;

use mvgen_models::SlotRef;
use thiserror::Error;

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Whether a slot push was creating a new slot or revising an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Create,
    Revise,
}

impl SlotAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotAction::Create => "create",
            SlotAction::Revise => "revise",
        }
    }
}

/// Step of a slot push that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStep {
    UploadTicket,
    Upload,
    Finalize,
    Push,
}

impl fmt::Display for SlotStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotStep::UploadTicket => "upload ticket",
            SlotStep::Upload => "byte upload",
            SlotStep::Finalize => "finalize",
            SlotStep::Push => "push",
        };
        write!(f, "{}", s)
    }
}

/// Errors that can occur talking to the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform configuration error: {0}")]
    Config(String),

    #[error("Failed to create slot {slot} ({step}): {body}")]
    SlotCreate {
        slot: String,
        step: SlotStep,
        status: Option<u16>,
        body: String,
    },

    #[error("Failed to revise slot {slot} ({step}): {body}")]
    SlotRevise {
        slot: String,
        step: SlotStep,
        status: Option<u16>,
        body: String,
    },

    #[error("Status read failed with {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("{operation} failed with {status}: {body}")]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} rejected by platform: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn http(operation: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            operation,
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// HTTP status carried by the error, if a response was received.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PlatformError::SlotCreate { status, .. } | PlatformError::SlotRevise { status, .. } => {
                *status
            }
            PlatformError::RemoteStatus { status, .. } | PlatformError::Http { status, .. } => {
                Some(*status)
            }
            PlatformError::Rejected { .. } => Some(200),
            PlatformError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Local I/O failures that a later identical request may not hit.
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::Network(e) => {
                e.is_timeout() || e.is_connect() || (e.status().is_none() && !e.is_decode())
            }
            _ => false,
        }
    }

    /// Remote response body or message preserved for diagnostics.
    pub fn remote_body(&self) -> Option<&str> {
        match self {
            PlatformError::SlotCreate { body, .. }
            | PlatformError::SlotRevise { body, .. }
            | PlatformError::RemoteStatus { body, .. }
            | PlatformError::Http { body, .. } => Some(body),
            PlatformError::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Re-tag a failed step of a slot push as a create or revise failure.
    pub fn into_slot_error(self, action: SlotAction, slot: &SlotRef, step: SlotStep) -> Self {
        let status = self.http_status();
        let body = self
            .remote_body()
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string());
        let slot = slot.reference();

        match action {
            SlotAction::Create => PlatformError::SlotCreate {
                slot,
                step,
                status,
                body,
            },
            SlotAction::Revise => PlatformError::SlotRevise {
                slot,
                step,
                status,
                body,
            },
        }
    }
}
