//! Shared data models for the mvgen orchestrator.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job parameters and the local job state machine
//! - Versioned remote slots and job handles
//! - Remote status mapping and UI status snapshots
//! - Analysis inputs, segments, scene prompts and generation requests

pub mod analysis;
pub mod job;
pub mod slot;
pub mod status;

// Re-export common types
pub use analysis::{
    AnalysisInput, AnalysisSegment, EnergySample, GenerationPlan, GenerationRequest, MoodTier,
    ScenePrompt, TranscriptSpan,
};
pub use job::{
    InputAssetRef, Job, JobId, JobParameters, JobParams, JobState, StateTransitionError,
    PARAMETERS_FILE,
};
pub use slot::{JobHandle, SlotKind, SlotRef, VersionToken};
pub use status::{RemoteState, StatusSnapshot, UiStage};
