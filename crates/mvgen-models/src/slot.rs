//! Versioned remote slots and job handles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two named slots a resource occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Holds the uploaded audio asset
    Input,
    /// Holds the executable job definition
    Job,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Input => "input",
            SlotKind::Job => "job",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named slot on the remote platform (`owner/slug`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SlotRef {
    pub owner: String,
    pub slug: String,
}

impl SlotRef {
    pub fn new(owner: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slug: slug.into(),
        }
    }

    /// `owner/slug` reference as the platform expects it.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.owner, self.slug)
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

/// Version number assigned by the platform on each push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VersionToken(pub u64);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier pair used to poll status and fetch output for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct JobHandle {
    /// Owner of both slots
    pub owner: String,
    /// Job slot slug
    pub slug: String,
    /// Input slot slug the job depends on
    pub input_slug: String,
}

impl JobHandle {
    pub fn new(owner: impl Into<String>, slug: impl Into<String>, input_slug: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slug: slug.into(),
            input_slug: input_slug.into(),
        }
    }

    pub fn job_slot(&self) -> SlotRef {
        SlotRef::new(&self.owner, &self.slug)
    }

    pub fn input_slot(&self) -> SlotRef {
        SlotRef::new(&self.owner, &self.input_slug)
    }

    /// Human-facing page for the remote job.
    pub fn web_url(&self, web_base: &str) -> String {
        format!(
            "{}/code/{}/{}",
            web_base.trim_end_matches('/'),
            self.owner,
            self.slug
        )
    }

    /// Human-facing output page for the remote job.
    pub fn output_url(&self, web_base: &str) -> String {
        format!("{}/output", self.web_url(web_base))
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}
