//! Output retrieval.
//!
//! Finds the finished artifact among a job's output files and opens it as a
//! stream, authenticating against the platform on the caller's behalf.
//! Nothing is retried.

use mvgen_models::JobHandle;
use mvgen_platform::{ByteStream, PlatformClient, PlatformError};
use tracing::{debug, info};

use crate::error::{JobError, JobResult};
use crate::metrics::record_download;

/// The finished artifact, ready to stream.
pub struct OutputArtifact {
    /// Suggested file name for the caller
    pub file_name: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// Locates and streams a job's final artifact.
#[derive(Clone)]
pub struct OutputRetriever {
    platform: PlatformClient,
    artifact_suffix: String,
}

impl OutputRetriever {
    pub fn new(platform: PlatformClient, artifact_suffix: impl Into<String>) -> Self {
        Self {
            platform,
            artifact_suffix: artifact_suffix.into(),
        }
    }

    /// Open the final artifact for `handle`.
    ///
    /// Fails with [`JobError::OutputNotReady`], listing the files currently
    /// visible, while no output name carries the artifact suffix. A listing
    /// that does not exist yet counts as empty.
    pub async fn fetch_output(&self, handle: &JobHandle) -> JobResult<OutputArtifact> {
        let listing = match self.platform.list_output(&handle.job_slot()).await {
            Ok(listing) => listing,
            Err(PlatformError::Http { status: 404, .. }) => Default::default(),
            Err(e) => {
                record_download("error");
                return Err(e.into());
            }
        };

        let Some(file) = listing.find_suffix(&self.artifact_suffix) else {
            let visible = listing.file_names();
            debug!(slug = %handle.slug, visible = visible.len(), "Final artifact not listed yet");
            record_download("not_ready");
            return Err(JobError::OutputNotReady { visible });
        };

        let remote = self.platform.open_file(&file.url).await.inspect_err(|_| {
            record_download("error");
        })?;

        let content_type = remote
            .content_type
            .filter(|ct| !is_generic_content_type(ct))
            .unwrap_or_else(|| content_type_for(&file.file_name).to_string());

        info!(
            slug = %handle.slug,
            file = %file.file_name,
            bytes = ?remote.content_length,
            "Streaming final artifact"
        );
        record_download("ok");

        Ok(OutputArtifact {
            file_name: file.file_name.clone(),
            content_type,
            content_length: remote.content_length,
            stream: remote.stream,
        })
    }
}

fn is_generic_content_type(ct: &str) -> bool {
    let ct = ct.trim().to_ascii_lowercase();
    ct.is_empty() || ct.starts_with("application/octet-stream") || ct.starts_with("binary/")
}

/// Content type inferred from a file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("night_final.MP4"), "video/mp4");
        assert_eq!(content_type_for("out.webm"), "video/webm");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_generic_content_types() {
        assert!(is_generic_content_type("application/octet-stream"));
        assert!(is_generic_content_type("binary/octet-stream"));
        assert!(!is_generic_content_type("video/mp4"));
    }
}
