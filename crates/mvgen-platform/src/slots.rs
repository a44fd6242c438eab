//! Versioned artifact client.
//!
//! Creates or revises the two named slots a job needs: the input slot
//! holding the audio asset and the job slot holding the executable
//! definition. A push to an existing slot adds a version and supersedes the
//! previous one; slots are never deleted.
//!
//! Multi-step pushes are not rolled back. Repeating the whole sequence after
//! a mid-sequence failure is always correct: the next attempt uploads again
//! and simply produces a newer version.

use bytes::Bytes;
use mvgen_models::{SlotKind, SlotRef, VersionToken};
use tracing::info;

use crate::client::PlatformClient;
use crate::error::{PlatformError, PlatformResult, SlotAction, SlotStep};
use crate::metrics::record_slot_push;
use crate::types::{JobPushRequest, PushResponse};

/// Resource flags attached to a job push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequirements {
    pub gpu: bool,
    pub internet: bool,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            gpu: true,
            internet: true,
        }
    }
}

/// One file pushed into an input slot.
#[derive(Debug, Clone)]
pub struct SlotFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl SlotFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Everything pushed into a job slot.
#[derive(Debug, Clone)]
pub struct JobSlotPayload {
    /// Display title of the remote job
    pub title: String,
    /// Runner source, pushed verbatim
    pub source: String,
    pub resources: ResourceRequirements,
    /// Input slots the job reads from
    pub input_slots: Vec<SlotRef>,
}

/// Creates or revises named slots on the platform.
#[derive(Clone)]
pub struct SlotClient {
    client: PlatformClient,
}

impl SlotClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    pub fn platform(&self) -> &PlatformClient {
        &self.client
    }

    /// Upload `files` as one new version of the input slot, creating the
    /// slot if it does not exist yet.
    ///
    /// Each file gets its own upload ticket; all tokens are finalized
    /// together so the version holds every file or none of them.
    pub async fn ensure_input_slot(
        &self,
        slot: &SlotRef,
        files: Vec<SlotFile>,
    ) -> PlatformResult<VersionToken> {
        if files.is_empty() {
            return Err(PlatformError::config(format!(
                "no files to push into input slot {}",
                slot
            )));
        }

        let action = if self.client.input_slot_exists(slot).await? {
            SlotAction::Revise
        } else {
            SlotAction::Create
        };

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let mut tokens = Vec::with_capacity(files.len());
        for file in files {
            let ticket = self
                .client
                .request_upload_ticket(&file.name, file.bytes.len() as u64)
                .await
                .map_err(|e| e.into_slot_error(action, slot, SlotStep::UploadTicket))?;

            self.client
                .upload_bytes(&ticket.create_url, file.bytes, &file.content_type)
                .await
                .map_err(|e| e.into_slot_error(action, slot, SlotStep::Upload))?;
            tokens.push(ticket.token);
        }

        let response = match action {
            SlotAction::Create => self.client.finalize_input_slot(slot, &slot.slug, tokens).await,
            SlotAction::Revise => {
                let notes = format!("Upload {}", names.join(", "));
                self.client.revise_input_slot(slot, &notes, tokens).await
            }
        }
        .map_err(|e| e.into_slot_error(action, slot, SlotStep::Finalize))?;

        let version = Self::version_of(&response, action, slot)?;
        record_slot_push(SlotKind::Input.as_str(), action.as_str());
        info!(
            slot = %slot,
            version = %version,
            action = action.as_str(),
            files = names.len(),
            "Input slot pushed"
        );
        Ok(version)
    }

    /// Push the job definition into the job slot.
    ///
    /// Pushing an unchanged definition is a plain version bump.
    pub async fn ensure_job_slot(
        &self,
        slot: &SlotRef,
        payload: &JobSlotPayload,
    ) -> PlatformResult<VersionToken> {
        let action = if self.client.job_slot_exists(slot).await? {
            SlotAction::Revise
        } else {
            SlotAction::Create
        };

        let request = JobPushRequest {
            slug: slot.reference(),
            new_title: payload.title.clone(),
            text: payload.source.clone(),
            language: "python".to_string(),
            kernel_type: "script".to_string(),
            is_private: true,
            enable_gpu: payload.resources.gpu,
            enable_internet: payload.resources.internet,
            dataset_data_sources: payload.input_slots.iter().map(SlotRef::reference).collect(),
        };

        let response = self
            .client
            .push_job_slot(&request)
            .await
            .map_err(|e| e.into_slot_error(action, slot, SlotStep::Push))?;

        let version = Self::version_of(&response, action, slot)?;
        record_slot_push(SlotKind::Job.as_str(), action.as_str());
        info!(
            slot = %slot,
            version = %version,
            action = action.as_str(),
            gpu = payload.resources.gpu,
            "Job slot pushed"
        );
        Ok(version)
    }

    /// A freshly created slot without a reported version is at its first one.
    fn version_of(
        response: &PushResponse,
        action: SlotAction,
        slot: &SlotRef,
    ) -> PlatformResult<VersionToken> {
        match (response.version(), action) {
            (Some(v), _) => Ok(v),
            (None, SlotAction::Create) => Ok(VersionToken(1)),
            (None, SlotAction::Revise) => Err(PlatformError::invalid_response(format!(
                "push to {} returned no version number",
                slot
            ))),
        }
    }
}
