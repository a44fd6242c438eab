//! Status reconciliation.
//!
//! One poll is one status read: the platform's state is mapped onto a fresh
//! [`StatusSnapshot`] and nothing is remembered between calls.

use mvgen_models::{JobHandle, RemoteState, StatusSnapshot};
use mvgen_platform::PlatformClient;
use tracing::debug;

use crate::error::JobResult;

/// Maps remote execution status onto UI snapshots.
#[derive(Clone)]
pub struct StatusReconciler {
    platform: PlatformClient,
}

impl StatusReconciler {
    pub fn new(platform: PlatformClient) -> Self {
        Self { platform }
    }

    /// Poll once; a completed job links to the platform's output page.
    pub async fn poll(&self, handle: &JobHandle) -> JobResult<StatusSnapshot> {
        let web_url = self.platform.web_url().to_string();
        self.poll_with(handle, move |h| h.output_url(&web_url)).await
    }

    /// Poll once; `download_url` builds the link reported on completion.
    pub async fn poll_with<F>(&self, handle: &JobHandle, download_url: F) -> JobResult<StatusSnapshot>
    where
        F: FnOnce(&JobHandle) -> String,
    {
        let status = self.platform.job_status(&handle.job_slot()).await?;
        let remote_state = RemoteState::parse(&status.status);

        let download_url = match remote_state {
            RemoteState::Complete => Some(download_url(handle)),
            _ => None,
        };

        debug!(
            slug = %handle.slug,
            remote_state = %remote_state,
            "Polled remote status"
        );

        Ok(StatusSnapshot::from_remote(
            remote_state,
            status.failure_message,
            download_url,
        ))
    }
}
