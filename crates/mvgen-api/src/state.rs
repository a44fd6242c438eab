//! Application state.

use std::collections::HashMap;
use std::sync::Arc;

use mvgen_jobs::{
    load_runner_source, JobRegistry, JobSubmissionService, JobsConfig, OutputRetriever, PollTask,
    StatusPoller, StatusReconciler,
};
use mvgen_models::{JobHandle, JobId};
use mvgen_platform::{PlatformClient, SlotClient};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::ApiConfig;
use crate::metrics::set_active_pollers;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub platform: PlatformClient,
    pub registry: JobRegistry,
    pub submissions: JobSubmissionService,
    pub reconciler: StatusReconciler,
    pub retriever: OutputRetriever,
    pub poller: StatusPoller,
    pollers: Arc<Mutex<HashMap<JobId, PollTask>>>,
}

impl AppState {
    /// Create state from environment configuration.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let platform = PlatformClient::from_env()?;
        let jobs_config = JobsConfig::from_env();
        let runner_source = load_runner_source(&jobs_config)?;

        Ok(Self::from_parts(config, platform, jobs_config, runner_source))
    }

    /// Wire state from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        platform: PlatformClient,
        jobs_config: JobsConfig,
        runner_source: Arc<str>,
    ) -> Self {
        let registry = JobRegistry::new();
        let reconciler = StatusReconciler::new(platform.clone());
        let retriever = OutputRetriever::new(platform.clone(), jobs_config.artifact_suffix.clone());
        let poller = StatusPoller::new(
            reconciler.clone(),
            registry.clone(),
            jobs_config.poll_interval,
        );
        let submissions = JobSubmissionService::new(
            SlotClient::new(platform.clone()),
            registry.clone(),
            Arc::new(jobs_config),
            runner_source,
        );

        Self {
            config,
            platform,
            registry,
            submissions,
            reconciler,
            retriever,
            poller,
            pollers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a background poller for a submitted job.
    pub async fn start_polling(&self, job_id: JobId, handle: JobHandle) {
        let mut pollers = self.pollers.lock().await;
        pollers.retain(|_, task| !task.is_finished());

        let task = self.poller.spawn(job_id.clone(), handle);
        pollers.insert(job_id, task);
        set_active_pollers(pollers.len());
    }

    /// Background pollers that have not finished yet.
    pub async fn active_pollers(&self) -> usize {
        let mut pollers = self.pollers.lock().await;
        pollers.retain(|_, task| !task.is_finished());
        pollers.len()
    }

    /// Cancel every background poller and wait for them to stop.
    pub async fn shutdown_pollers(&self) {
        let tasks: Vec<PollTask> = self.pollers.lock().await.drain().map(|(_, t)| t).collect();
        let count = tasks.len();

        for task in &tasks {
            task.cancel();
        }
        for task in tasks {
            task.join().await;
        }

        set_active_pollers(0);
        if count > 0 {
            info!("Stopped {} background pollers", count);
        }
    }
}
