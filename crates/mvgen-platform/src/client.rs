//! Platform REST API client.
//!
//! Every call carries HTTP basic auth built from the configured credential
//! pair. Requests are wrapped in a tracing span and recorded in the request
//! metrics. Nothing is retried here; retry policy belongs to the caller.

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use mvgen_models::SlotRef;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};
use url::Url;

use crate::config::PlatformConfig;
use crate::error::{PlatformError, PlatformResult};
use crate::metrics::record_request;
use crate::types::{
    BlobUploadRequest, BlobUploadResponse, InputSlotCreateRequest, InputSlotVersionRequest,
    JobPushRequest, JobStatusResponse, OutputListing, PushResponse, UploadedFile,
};

/// Body of a remote file, streamed chunk by chunk.
pub type ByteStream = BoxStream<'static, PlatformResult<Bytes>>;

/// An opened remote file.
pub struct RemoteFile {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// Platform REST API client.
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    config: PlatformConfig,
}

impl PlatformClient {
    /// Create a new platform client.
    pub fn new(config: PlatformConfig) -> PlatformResult<Self> {
        Url::parse(&config.api_url)
            .map_err(|e| PlatformError::config(format!("invalid PLATFORM_API_URL: {}", e)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("mvgen-platform/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PlatformError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> PlatformResult<Self> {
        Self::new(PlatformConfig::from_env()?)
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn web_url(&self) -> &str {
        &self.config.web_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn slot_path(prefix: &str, slot: &SlotRef) -> String {
        format!(
            "{}/{}/{}",
            prefix,
            urlencoding::encode(&slot.owner),
            urlencoding::encode(&slot.slug)
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.username, Some(&self.config.key))
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.authed(self.http.get(url))
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.authed(self.http.post(url))
    }

    // =========================================================================
    // Input slots
    // =========================================================================

    /// Whether the named input slot exists.
    pub async fn input_slot_exists(&self, slot: &SlotRef) -> PlatformResult<bool> {
        let url = self.endpoint(&Self::slot_path("/datasets/status", slot));

        self.execute("input_slot_status", &slot.slug, async {
            let response = self.get(&url).send().await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(false),
                s if s.is_success() => Ok(true),
                _ => Err(Self::error_response("input_slot_status", response).await),
            }
        })
        .await
    }

    /// Ask for a ticket to upload `content_length` bytes named `file_name`.
    pub async fn request_upload_ticket(
        &self,
        file_name: &str,
        content_length: u64,
    ) -> PlatformResult<BlobUploadResponse> {
        let url = self.endpoint("/blobs/upload");
        let body = BlobUploadRequest {
            blob_type: "dataset".to_string(),
            name: file_name.to_string(),
            content_length,
            last_modified_epoch_seconds: chrono::Utc::now().timestamp(),
        };

        self.execute("upload_ticket", file_name, async {
            let response = self.post(&url).json(&body).send().await?;
            let response = Self::check("upload_ticket", response).await?;
            let ticket: BlobUploadResponse = response.json().await?;
            if ticket.token.is_empty() || ticket.create_url.is_empty() {
                return Err(PlatformError::invalid_response(
                    "upload ticket is missing token or createUrl",
                ));
            }
            Ok(ticket)
        })
        .await
    }

    /// Upload raw bytes to the URL from an upload ticket.
    pub async fn upload_bytes(
        &self,
        create_url: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> PlatformResult<()> {
        let len = bytes.len();
        let target = log_target(create_url);

        self.execute("upload_bytes", &target, async {
            // The signed URL is a credential; keep it out of error messages
            let response = self
                .http
                .put(create_url)
                .header(header::CONTENT_TYPE, content_type)
                .body(bytes)
                .send()
                .await
                .map_err(|e| PlatformError::Network(e.without_url()))?;
            Self::check("upload_bytes", response).await?;
            debug!(bytes = len, "Uploaded blob");
            Ok(())
        })
        .await
    }

    /// Finalize creation of a new input slot from uploaded tokens.
    pub async fn finalize_input_slot(
        &self,
        slot: &SlotRef,
        title: &str,
        tokens: Vec<String>,
    ) -> PlatformResult<PushResponse> {
        let url = self.endpoint("/datasets/create/new");
        let body = InputSlotCreateRequest {
            title: title.to_string(),
            slug: slot.slug.clone(),
            owner_slug: slot.owner.clone(),
            license_name: "CC0-1.0".to_string(),
            is_private: true,
            convert_to_csv: false,
            files: uploaded(tokens),
        };

        self.execute("input_slot_create", &slot.slug, async {
            let response = self.post(&url).json(&body).send().await?;
            Self::push_response("input_slot_create", response).await
        })
        .await
    }

    /// Post a new version of an existing input slot, retiring older versions.
    pub async fn revise_input_slot(
        &self,
        slot: &SlotRef,
        notes: &str,
        tokens: Vec<String>,
    ) -> PlatformResult<PushResponse> {
        let url = self.endpoint(&Self::slot_path("/datasets/create/version", slot));
        let body = InputSlotVersionRequest {
            version_notes: notes.to_string(),
            convert_to_csv: false,
            delete_old_versions: true,
            files: uploaded(tokens),
        };

        self.execute("input_slot_revise", &slot.slug, async {
            let response = self.post(&url).json(&body).send().await?;
            Self::push_response("input_slot_revise", response).await
        })
        .await
    }

    // =========================================================================
    // Job slots
    // =========================================================================

    /// Whether the named job slot exists.
    pub async fn job_slot_exists(&self, slot: &SlotRef) -> PlatformResult<bool> {
        let url = self.endpoint("/kernels/pull");

        self.execute("job_slot_status", &slot.slug, async {
            let response = self
                .get(&url)
                .query(&[("userName", &slot.owner), ("kernelSlug", &slot.slug)])
                .send()
                .await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(false),
                s if s.is_success() => Ok(true),
                _ => Err(Self::error_response("job_slot_status", response).await),
            }
        })
        .await
    }

    /// Push a job definition. Creates the slot or adds a version to it.
    pub async fn push_job_slot(&self, request: &JobPushRequest) -> PlatformResult<PushResponse> {
        let url = self.endpoint("/kernels/push");

        self.execute("job_slot_push", &request.slug, async {
            let response = self.post(&url).json(request).send().await?;
            Self::push_response("job_slot_push", response).await
        })
        .await
    }

    /// Execution status of the job slot's latest version.
    pub async fn job_status(&self, slot: &SlotRef) -> PlatformResult<JobStatusResponse> {
        let url = self.endpoint("/kernels/status");

        self.execute("job_status", &slot.slug, async {
            let response = self
                .get(&url)
                .query(&[("userName", &slot.owner), ("kernelSlug", &slot.slug)])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PlatformError::RemoteStatus {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(response.json().await?)
        })
        .await
    }

    /// Files written by the job slot's latest run.
    pub async fn list_output(&self, slot: &SlotRef) -> PlatformResult<OutputListing> {
        let url = self.endpoint("/kernels/output");

        self.execute("list_output", &slot.slug, async {
            let response = self
                .get(&url)
                .query(&[("userName", &slot.owner), ("kernelSlug", &slot.slug)])
                .send()
                .await?;
            let response = Self::check("list_output", response).await?;
            Ok(response.json().await?)
        })
        .await
    }

    /// Open a remote file for streaming.
    ///
    /// Relative URLs resolve against the API base. Credentials are only
    /// attached when the file lives on the platform's own host; signed
    /// storage URLs are fetched as-is.
    pub async fn open_file(&self, file_url: &str) -> PlatformResult<RemoteFile> {
        let base = Url::parse(&self.config.api_url)
            .map_err(|e| PlatformError::config(format!("invalid PLATFORM_API_URL: {}", e)))?;
        let target = base
            .join(file_url)
            .map_err(|e| PlatformError::invalid_response(format!("bad file url {}: {}", file_url, e)))?;

        let same_host = target.host_str() == base.host_str()
            && target.port_or_known_default() == base.port_or_known_default();

        self.execute("open_file", target.path(), async {
            let mut request = self.http.get(target.clone());
            if same_host {
                request = self.authed(request);
            }
            let response = request.send().await?;
            let response = Self::check("open_file", response).await?;

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let content_length = response.content_length();
            let stream = response
                .bytes_stream()
                .map_err(PlatformError::Network)
                .boxed();

            Ok(RemoteFile {
                content_type,
                content_length,
                stream,
            })
        })
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute<T, F>(&self, operation: &'static str, target: &str, fut: F) -> PlatformResult<T>
    where
        F: Future<Output = PlatformResult<T>>,
    {
        let span = info_span!("platform_request", operation = %operation, target = %target);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn check(operation: &'static str, response: Response) -> PlatformResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_response(operation, response).await)
        }
    }

    async fn error_response(operation: &'static str, response: Response) -> PlatformError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        PlatformError::http(operation, status, body)
    }

    async fn push_response(operation: &'static str, response: Response) -> PlatformResult<PushResponse> {
        let response = Self::check(operation, response).await?;
        let push: PushResponse = response.json().await?;
        if let Some(message) = push.rejection() {
            return Err(PlatformError::Rejected {
                operation,
                message: message.to_string(),
            });
        }
        Ok(push)
    }
}

/// Host and path of `url`, without the query string that carries signatures.
fn log_target(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path()),
        Err(_) => "<unparseable url>".to_string(),
    }
}

fn uploaded(tokens: Vec<String>) -> Vec<UploadedFile> {
    tokens
        .into_iter()
        .map(|token| UploadedFile {
            token,
            description: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_target_drops_signature() {
        assert_eq!(
            log_target("https://storage.example.com/upload/tok-1?X-Goog-Signature=abc&X-Goog-Credential=k"),
            "storage.example.com/upload/tok-1"
        );
        assert_eq!(log_target("not a url"), "<unparseable url>");
    }
}
