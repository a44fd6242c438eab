//! Job orchestration configuration.

use std::path::PathBuf;
use std::time::Duration;

use mvgen_models::JobId;

/// How slot slugs are derived for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotNaming {
    /// Unique slots per job, so concurrent jobs never clobber each other
    #[default]
    PerJob,
    /// One input slot and one job slot for the whole deployment; a new
    /// submission supersedes whatever ran before
    Fixed,
}

impl SlotNaming {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_job" | "per-job" | "perjob" => Some(SlotNaming::PerJob),
            "fixed" | "singleton" => Some(SlotNaming::Fixed),
            _ => None,
        }
    }

    pub fn input_slug(&self, prefix: &str, job_id: &JobId) -> String {
        match self {
            SlotNaming::PerJob => format!("{}-in-{}", prefix, job_id.short()),
            SlotNaming::Fixed => format!("{}-input", prefix),
        }
    }

    pub fn job_slug(&self, prefix: &str, job_id: &JobId) -> String {
        match self {
            SlotNaming::PerJob => format!("{}-job-{}", prefix, job_id.short()),
            SlotNaming::Fixed => format!("{}-job", prefix),
        }
    }
}

/// Job orchestration configuration.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Owner of both slots; the platform username when unset
    pub slot_owner: Option<String>,
    /// Prefix for every slot slug
    pub slot_prefix: String,
    pub slot_naming: SlotNaming,
    /// Fixed interval between status polls
    pub poll_interval: Duration,
    /// File name suffix marking the finished artifact
    pub artifact_suffix: String,
    /// Runner script pushed as the job source; the bundled runner when unset
    pub runner_source_path: Option<PathBuf>,
    pub enable_gpu: bool,
    pub enable_internet: bool,
    /// Seed for prompt chaining inside the remote job
    pub prompt_seed: u64,
    pub frames_per_second: u32,
    /// Largest accepted audio upload
    pub max_upload_bytes: usize,
    /// How long finished jobs stay queryable
    pub finished_job_ttl: Duration,
    /// Most finished jobs kept in memory at once
    pub max_finished_jobs: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            slot_owner: None,
            slot_prefix: "mvgen".to_string(),
            slot_naming: SlotNaming::PerJob,
            poll_interval: Duration::from_secs(30),
            artifact_suffix: "_final.mp4".to_string(),
            runner_source_path: None,
            enable_gpu: true,
            enable_internet: true,
            prompt_seed: 42,
            frames_per_second: 8,
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
            finished_job_ttl: Duration::from_secs(24 * 3600),
            max_finished_jobs: 1000,
        }
    }
}

impl JobsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            slot_owner: std::env::var("SLOT_OWNER").ok().filter(|s| !s.is_empty()),
            slot_prefix: std::env::var("SLOT_PREFIX").unwrap_or(defaults.slot_prefix),
            slot_naming: std::env::var("SLOT_NAMING")
                .ok()
                .and_then(|s| SlotNaming::parse(&s))
                .unwrap_or(defaults.slot_naming),
            poll_interval: Duration::from_secs(
                std::env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            artifact_suffix: std::env::var("ARTIFACT_SUFFIX").unwrap_or(defaults.artifact_suffix),
            runner_source_path: std::env::var("RUNNER_SOURCE_PATH").ok().map(PathBuf::from),
            enable_gpu: std::env::var("ENABLE_GPU")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            enable_internet: std::env::var("ENABLE_INTERNET")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            prompt_seed: std::env::var("PROMPT_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(42),
            frames_per_second: std::env::var("FRAMES_PER_SECOND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            finished_job_ttl: std::env::var("FINISHED_JOB_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.finished_job_ttl),
            max_finished_jobs: std::env::var("MAX_FINISHED_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_finished_jobs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_job_slugs_are_unique() {
        let a = JobId::from_string("0a1b2c3d-0000-4000-8000-000000000000");
        let b = JobId::from_string("9f8e7d6c-0000-4000-8000-000000000000");
        let naming = SlotNaming::PerJob;

        assert_eq!(naming.input_slug("mvgen", &a), "mvgen-in-0a1b2c3d");
        assert_eq!(naming.job_slug("mvgen", &a), "mvgen-job-0a1b2c3d");
        assert_ne!(naming.job_slug("mvgen", &a), naming.job_slug("mvgen", &b));
    }

    #[test]
    fn test_fixed_slugs_ignore_job_id() {
        let naming = SlotNaming::Fixed;
        assert_eq!(naming.input_slug("mvgen", &JobId::new()), "mvgen-input");
        assert_eq!(naming.job_slug("mvgen", &JobId::new()), "mvgen-job");
    }

    #[test]
    fn test_parse_naming() {
        assert_eq!(SlotNaming::parse("FIXED"), Some(SlotNaming::Fixed));
        assert_eq!(SlotNaming::parse("per_job"), Some(SlotNaming::PerJob));
        assert_eq!(SlotNaming::parse("shared"), None);
    }

    #[test]
    fn test_defaults() {
        let config = JobsConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.artifact_suffix, "_final.mp4");
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.finished_job_ttl, Duration::from_secs(86_400));
        assert_eq!(config.max_finished_jobs, 1000);
    }
}
