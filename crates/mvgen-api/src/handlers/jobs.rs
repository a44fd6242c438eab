//! Job handlers.
//!
//! Submission takes a multipart form with the audio file and generation
//! parameters. Status reads poll the platform on every call; downloads proxy
//! the finished artifact so platform credentials never reach the client.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mvgen_jobs::{InputAsset, JobError, JobRecord};
use mvgen_models::{JobHandle, JobId, JobParams, JobState, RemoteState, StatusSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Clip duration used when the form leaves it out.
pub const DEFAULT_CLIP_DURATION_SECS: u32 = 15;

// ============================================================================
// Types
// ============================================================================

/// Response for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub state: JobState,
    pub remote: JobHandle,
    /// Platform page for the remote job
    pub web_url: String,
    pub status_url: String,
    pub download_url: String,
}

struct SubmissionForm {
    params: JobParams,
    audio: Option<InputAsset>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/jobs
///
/// Multipart fields: `audio` (file), `title`, `style`, `clip_duration`.
///
/// Returns:
/// - 202: Job submitted to the platform
/// - 400: Missing audio or invalid parameters
/// - 502: The platform rejected an upload or push
pub async fn submit_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let form = read_submission(multipart).await?;
    let submitted = state.submissions.submit(form.params, form.audio).await?;
    let job_id = submitted.job.id.clone();

    if state.config.background_polling {
        state
            .start_polling(job_id.clone(), submitted.handle.clone())
            .await;
    }

    info!(
        job_id = %job_id,
        slug = %submitted.handle.slug,
        "Job submitted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            status_url: format!("/api/jobs/{}/status", job_id),
            download_url: download_path(&job_id),
            job_id,
            state: submitted.job.state,
            remote: submitted.handle,
            web_url: submitted.web_url,
        }),
    ))
}

/// GET /api/jobs/:job_id
///
/// The stored job record with its last observed snapshot.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    let job_id = JobId::from_string(job_id);
    Ok(Json(find_record(&state, &job_id).await?))
}

/// GET /api/jobs/:job_id/status
///
/// Polls the platform once and returns a fresh snapshot. Jobs that already
/// reached a terminal state answer from the registry. When the platform
/// cannot be reached the last recorded snapshot is returned instead.
///
/// Returns:
/// - 200: Status snapshot
/// - 404: Job not found
/// - 502: The platform answered with a non-success status
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StatusSnapshot>> {
    let job_id = JobId::from_string(job_id);
    let record = find_record(&state, &job_id).await?;

    let Some(handle) = record.handle().cloned() else {
        return Ok(Json(unsubmitted_snapshot(&record)));
    };
    if record.job.is_terminal() {
        if let Some(latest) = record.latest {
            return Ok(Json(latest));
        }
    }

    let download_url = download_path(&job_id);
    match state.reconciler.poll_with(&handle, |_| download_url).await {
        Ok(snapshot) => {
            let snapshot = state
                .registry
                .apply_snapshot(&job_id, snapshot.clone())
                .await
                .and_then(|r| r.latest)
                .unwrap_or(snapshot);
            Ok(Json(snapshot))
        }
        Err(e) if e.is_transient() => {
            warn!(
                job_id = %job_id,
                slug = %handle.slug,
                "Status poll failed, returning last snapshot: {}", e
            );
            let fallback = record.latest.unwrap_or_else(|| {
                StatusSnapshot::from_remote(RemoteState::Unknown("unreachable".to_string()), None, None)
                    .with_timestamps(record.job.submitted_at, None)
            });
            Ok(Json(fallback))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /api/jobs/:job_id/download
///
/// Streams the finished artifact.
///
/// Returns:
/// - 200: Artifact bytes with content type, length and a suggested filename
/// - 404: Job not found
/// - 409: Output not ready yet; `files` lists what the job has written so far
/// - 409: The job failed or was cancelled (`code: remote_job_failed`)
pub async fn download_output(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = JobId::from_string(job_id);
    let record = find_record(&state, &job_id).await?;
    let handle = record
        .handle()
        .cloned()
        .ok_or_else(|| JobError::NotSubmitted(job_id.to_string()))?;

    // A failed or superseded job has no artifact of its own on the slot
    if let Some(err) = terminal_failure(&record) {
        debug!(job_id = %job_id, state = %record.job.state, "Refusing download for failed job");
        return Err(err.into());
    }

    let artifact = state.retriever.fetch_output(&handle).await?;
    debug!(job_id = %job_id, file = %artifact.file_name, "Proxying artifact");

    let content_type = HeaderValue::from_str(&artifact.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = Body::from_stream(artifact.stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(len) = artifact.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(value) = content_disposition(&artifact.file_name).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

async fn find_record(state: &AppState, job_id: &JobId) -> ApiResult<JobRecord> {
    state
        .registry
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Job {}", job_id)))
}

fn download_path(job_id: &JobId) -> String {
    format!("/api/jobs/{}/download", job_id)
}

/// Snapshot for a job that never reached the platform.
fn unsubmitted_snapshot(record: &JobRecord) -> StatusSnapshot {
    let remote_state = match record.job.state {
        JobState::Failed => RemoteState::Error,
        JobState::Cancelled => RemoteState::Cancelled,
        other => RemoteState::Unknown(other.as_str().to_string()),
    };
    StatusSnapshot::from_remote(remote_state, record.job.error_message.clone(), None)
        .with_timestamps(record.job.submitted_at, record.job.finished_at)
}

/// `RemoteJobFailed` for a job that ended in error or was cancelled.
fn terminal_failure(record: &JobRecord) -> Option<JobError> {
    let fallback = match record.job.state {
        JobState::Failed => RemoteState::Error,
        JobState::Cancelled => RemoteState::Cancelled,
        _ => return None,
    };
    let state = record
        .latest
        .as_ref()
        .map(|s| s.remote_state.clone())
        .filter(|s| matches!(s, RemoteState::Error | RemoteState::Cancelled))
        .unwrap_or(fallback);
    let message = record
        .job
        .error_message
        .clone()
        .unwrap_or_else(|| "no diagnostic message".to_string());

    Some(JobError::RemoteJobFailed { state, message })
}

fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

async fn read_submission(mut multipart: Multipart) -> ApiResult<SubmissionForm> {
    let mut title = String::new();
    let mut style = String::new();
    let mut clip_duration = DEFAULT_CLIP_DURATION_SECS;
    let mut audio = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read audio: {}", e)))?;

                // Browsers send an empty part when no file was chosen
                if !(bytes.is_empty() && file_name.is_empty()) {
                    audio = Some(InputAsset {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            "title" | "style" | "clip_duration" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid field {}: {}", name, e)))?;
                match name.as_str() {
                    "title" => title = value.trim().to_string(),
                    "style" => style = value.trim().to_string(),
                    _ => {
                        clip_duration = value.trim().parse().map_err(|_| {
                            ApiError::Validation(format!(
                                "clip_duration must be a whole number of seconds, got {:?}",
                                value
                            ))
                        })?;
                    }
                }
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(SubmissionForm {
        params: JobParams {
            title,
            visual_style: style,
            clip_duration_seconds: clip_duration,
        },
        audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_is_header_safe() {
        assert_eq!(
            content_disposition("night_final.mp4"),
            "attachment; filename=\"night_final.mp4\""
        );
        assert_eq!(
            content_disposition("a \"b\"\n.mp4"),
            "attachment; filename=\"a__b__.mp4\""
        );
    }

    #[test]
    fn test_download_path() {
        let id = JobId::from_string("abc");
        assert_eq!(download_path(&id), "/api/jobs/abc/download");
    }
}
