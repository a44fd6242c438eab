//! Job submission.
//!
//! Validates the request, pushes the input slot and then the job slot that
//! references it, and registers the job. There is no rollback: if the job
//! push fails after the input push succeeded, the input slot simply keeps its
//! new version and the next attempt revises it again.

use std::sync::Arc;

use bytes::Bytes;
use mvgen_models::{
    InputAssetRef, Job, JobHandle, JobId, JobParams, JobState, SlotRef, PARAMETERS_FILE,
};
use mvgen_platform::{SlotClient, SlotFile};
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::config::JobsConfig;
use crate::definition::JobDefinition;
use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::metrics::record_submission;
use crate::registry::JobRegistry;

/// Uploaded audio as received from the caller.
#[derive(Debug, Clone)]
pub struct InputAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job: Job,
    pub handle: JobHandle,
    /// Human-facing page for the remote job
    pub web_url: String,
}

/// Submits jobs to the platform.
#[derive(Clone)]
pub struct JobSubmissionService {
    slots: SlotClient,
    registry: JobRegistry,
    config: Arc<JobsConfig>,
    runner_source: Arc<str>,
    owner: String,
}

impl JobSubmissionService {
    pub fn new(
        slots: SlotClient,
        registry: JobRegistry,
        config: Arc<JobsConfig>,
        runner_source: Arc<str>,
    ) -> Self {
        let owner = config
            .slot_owner
            .clone()
            .unwrap_or_else(|| slots.platform().username().to_string());

        Self {
            slots,
            registry,
            config,
            runner_source,
            owner,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Input and job slots for `job_id` under the configured naming.
    pub fn slot_refs(&self, job_id: &JobId) -> (SlotRef, SlotRef) {
        let naming = self.config.slot_naming;
        let prefix = &self.config.slot_prefix;
        (
            SlotRef::new(&self.owner, naming.input_slug(prefix, job_id)),
            SlotRef::new(&self.owner, naming.job_slug(prefix, job_id)),
        )
    }

    /// Validate and submit a job.
    pub async fn submit(
        &self,
        params: JobParams,
        input: Option<InputAsset>,
    ) -> JobResult<SubmittedJob> {
        let input = input.ok_or(JobError::MissingInput)?;
        params
            .validate()
            .map_err(|e| JobError::validation(e.to_string()))?;
        let asset = self.validate_asset(&input)?;

        self.registry
            .prune_finished(self.config.finished_job_ttl, self.config.max_finished_jobs)
            .await;

        let mut job = Job::new(params, asset);
        let logger = JobLogger::new(&job.id, "submit");
        logger.started(&format!(
            "{} ({} bytes)",
            job.input_asset.file_name, job.input_asset.size_bytes
        ));
        self.registry.upsert(job.clone()).await;

        match self.push(&mut job, input.bytes, &logger).await {
            Ok(handle) => {
                self.registry.upsert(job.clone()).await;
                self.registry.supersede(&handle, &job.id).await;
                record_submission("submitted");

                let web_url = handle.web_url(self.slots.platform().web_url());
                logger.finished(&format!("remote job {}", web_url));

                Ok(SubmittedJob {
                    job,
                    handle,
                    web_url,
                })
            }
            Err(e) => {
                logger.failed(&e.to_string());
                job.fail(e.to_string());
                self.registry.upsert(job).await;
                record_submission("failed");
                Err(e)
            }
        }
    }

    async fn push(&self, job: &mut Job, bytes: Bytes, logger: &JobLogger) -> JobResult<JobHandle> {
        let (input_slot, job_slot) = self.slot_refs(&job.id);

        job.transition(JobState::Uploading)?;
        self.registry.upsert(job.clone()).await;

        let definition = JobDefinition::build(
            job,
            &job_slot.slug,
            &input_slot,
            Arc::clone(&self.runner_source),
            &self.config,
        );
        let files = vec![
            SlotFile::new(
                job.input_asset.file_name.clone(),
                job.input_asset.content_type.clone(),
                bytes,
            ),
            definition.parameters_file()?,
        ];

        let input_version = self.slots.ensure_input_slot(&input_slot, files).await?;
        logger.progress(&format!("input slot {} at {}", input_slot, input_version));

        let payload = definition.into_payload(input_slot.clone());

        let job_version = self.slots.ensure_job_slot(&job_slot, &payload).await?;
        logger.progress(&format!("job slot {} at {}", job_slot, job_version));

        let handle = JobHandle::new(job_slot.owner, job_slot.slug, input_slot.slug);
        job.assign_handle(handle.clone());
        job.transition(JobState::Submitted)?;
        Ok(handle)
    }

    fn validate_asset(&self, input: &InputAsset) -> JobResult<InputAssetRef> {
        if input.bytes.is_empty() {
            return Err(JobError::validation("Audio file is empty"));
        }
        if input.bytes.len() > self.config.max_upload_bytes {
            return Err(JobError::validation(format!(
                "Audio file is {} bytes, limit is {}",
                input.bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let file_name = sanitize_file_name(&input.file_name);
        let content_type = audio_content_type(&file_name, &input.content_type).ok_or_else(|| {
            JobError::validation(format!(
                "Unsupported content type {:?}; an audio file is required",
                input.content_type
            ))
        })?;

        Ok(InputAssetRef {
            file_name,
            size_bytes: input.bytes.len() as u64,
            content_type,
            sha256: sha256_hex(&input.bytes),
        })
    }
}

/// Declared `audio/*` type, or one inferred from the extension when the
/// declared type is missing or generic.
pub fn audio_content_type(file_name: &str, declared: &str) -> Option<String> {
    let declared = declared.trim().to_ascii_lowercase();
    if declared.starts_with("audio/") {
        return Some(declared);
    }
    if !(declared.is_empty() || declared == "application/octet-stream") {
        return None;
    }

    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let guessed = match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "opus" => "audio/opus",
        _ => return None,
    };
    Some(guessed.to_string())
}

/// Base name restricted to characters safe in a remote file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "audio".to_string()
    } else if cleaned.eq_ignore_ascii_case(PARAMETERS_FILE) {
        // Shares the input slot with the parameter file
        format!("audio_{}", cleaned)
    } else {
        cleaned
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_content_type() {
        assert_eq!(
            audio_content_type("a.bin", "Audio/MPEG").as_deref(),
            Some("audio/mpeg")
        );
        assert_eq!(
            audio_content_type("song.flac", "application/octet-stream").as_deref(),
            Some("audio/flac")
        );
        assert_eq!(audio_content_type("song.wav", "").as_deref(), Some("audio/wav"));
        assert!(audio_content_type("clip.mp4", "video/mp4").is_none());
        assert!(audio_content_type("notes.txt", "").is_none());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/My Song (live).mp3"), "My_Song__live_.mp3");
        assert_eq!(sanitize_file_name("C:\\music\\track.wav"), "track.wav");
        assert_eq!(sanitize_file_name(".."), "audio");
        assert_eq!(sanitize_file_name("parameters.json"), "audio_parameters.json");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
