//! Executable job definitions.
//!
//! The runner source is pushed verbatim. Everything user-supplied travels in
//! the typed [`JobParameters`] record, uploaded as `parameters.json` into the
//! input slot the job mounts, so no user text ever becomes part of the
//! executable payload.

use std::sync::Arc;

use bytes::Bytes;
use mvgen_models::{Job, JobParameters, SlotRef, PARAMETERS_FILE};
use mvgen_platform::{JobSlotPayload, ResourceRequirements, SlotFile};

use crate::config::JobsConfig;
use crate::error::JobResult;

/// Runner bundled with the crate.
pub const DEFAULT_RUNNER_SOURCE: &str = include_str!("../runner/runner.py");

/// Load the runner source from `RUNNER_SOURCE_PATH`, or the bundled runner.
pub fn load_runner_source(config: &JobsConfig) -> JobResult<Arc<str>> {
    match &config.runner_source_path {
        Some(path) => Ok(Arc::from(std::fs::read_to_string(path)?)),
        None => Ok(Arc::from(DEFAULT_RUNNER_SOURCE)),
    }
}

/// What gets pushed into a job slot for one job.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub title: String,
    pub source: Arc<str>,
    pub parameters: JobParameters,
    pub resources: ResourceRequirements,
}

impl JobDefinition {
    /// Build the definition for `job`, reading its audio from `input_slot`.
    pub fn build(
        job: &Job,
        job_slug: &str,
        input_slot: &SlotRef,
        source: Arc<str>,
        config: &JobsConfig,
    ) -> Self {
        let parameters = JobParameters {
            title: job.params.title.clone(),
            visual_style: job.params.visual_style.clone(),
            clip_duration_seconds: job.params.clip_duration_seconds,
            prompt_seed: config.prompt_seed,
            frames_per_second: config.frames_per_second,
            input_slot: input_slot.reference(),
            input_file: job.input_asset.file_name.clone(),
            artifact_suffix: config.artifact_suffix.clone(),
        };

        Self {
            // Remote title mirrors the slug; the user title is a parameter.
            title: job_slug.to_string(),
            source,
            parameters,
            resources: ResourceRequirements {
                gpu: config.enable_gpu,
                internet: config.enable_internet,
            },
        }
    }

    /// The parameter record as the file the runner reads from its input.
    pub fn parameters_file(&self) -> JobResult<SlotFile> {
        let json = serde_json::to_vec_pretty(&self.parameters)?;
        Ok(SlotFile::new(PARAMETERS_FILE, "application/json", Bytes::from(json)))
    }

    pub fn into_payload(self, input_slot: SlotRef) -> JobSlotPayload {
        JobSlotPayload {
            title: self.title,
            source: self.source.to_string(),
            resources: self.resources,
            input_slots: vec![input_slot],
        }
    }
}
