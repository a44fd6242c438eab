//! Wire types for the platform's JSON API.

use mvgen_models::VersionToken;
use serde::{Deserialize, Serialize};

/// Request for an upload ticket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobUploadRequest {
    #[serde(rename = "type")]
    pub blob_type: String,
    pub name: String,
    pub content_length: u64,
    pub last_modified_epoch_seconds: i64,
}

/// Upload ticket: a token to reference later and a URL to upload bytes to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobUploadResponse {
    pub token: String,
    pub create_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Finalize creation of a new input slot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSlotCreateRequest {
    pub title: String,
    pub slug: String,
    pub owner_slug: String,
    pub license_name: String,
    pub is_private: bool,
    pub convert_to_csv: bool,
    pub files: Vec<UploadedFile>,
}

/// Post a new version of an existing input slot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSlotVersionRequest {
    pub version_notes: String,
    pub convert_to_csv: bool,
    pub delete_old_versions: bool,
    pub files: Vec<UploadedFile>,
}

/// Push of an executable job definition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPushRequest {
    /// `owner/slug`
    pub slug: String,
    pub new_title: String,
    pub text: String,
    pub language: String,
    pub kernel_type: String,
    pub is_private: bool,
    pub enable_gpu: bool,
    pub enable_internet: bool,
    pub dataset_data_sources: Vec<String>,
}

/// Response to any slot push.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub version_number: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PushResponse {
    /// Error message reported alongside a 2xx status, if any.
    pub fn rejection(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn version(&self) -> Option<VersionToken> {
        self.version_number.map(VersionToken)
    }
}

/// Execution status of a job slot's latest version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: String,
    #[serde(default)]
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub file_name: String,
    pub url: String,
}

/// Files the latest job run has written so far.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputListing {
    #[serde(default)]
    pub files: Vec<OutputFile>,
    #[serde(default)]
    pub log: Option<String>,
}

impl OutputListing {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.file_name.clone()).collect()
    }

    /// First file whose name ends with `suffix`.
    pub fn find_suffix(&self, suffix: &str) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.file_name.ends_with(suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_response_rejection() {
        let ok: PushResponse =
            serde_json::from_str(r#"{"ref":"a/b","url":"u","versionNumber":3,"error":""}"#)
                .unwrap();
        assert!(ok.rejection().is_none());
        assert_eq!(ok.version(), Some(VersionToken(3)));

        let rejected: PushResponse =
            serde_json::from_str(r#"{"error":"Notebook not found"}"#).unwrap();
        assert_eq!(rejected.rejection(), Some("Notebook not found"));
        assert!(rejected.version().is_none());
    }

    #[test]
    fn test_output_listing_suffix_match() {
        let listing: OutputListing = serde_json::from_str(
            r#"{"files":[{"fileName":"clip_001.mp4","url":"u1"},{"fileName":"night_drive_final.mp4","url":"u2"}]}"#,
        )
        .unwrap();
        assert_eq!(listing.find_suffix("_final.mp4").map(|f| f.url.as_str()), Some("u2"));
        assert!(listing.find_suffix(".wav").is_none());
        assert_eq!(listing.file_names().len(), 2);
    }
}
