//! In-process job registry keyed by job ID.
//!
//! Concurrent submissions and pollers share one registry. A record holds the
//! job, its remote handle and the latest status snapshot; snapshots move the
//! local state machine forward and never backwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mvgen_models::{Job, JobHandle, JobId, JobState, RemoteState, StatusSnapshot};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A job plus the last status observed for it.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<StatusSnapshot>,
}

impl JobRecord {
    pub fn handle(&self) -> Option<&JobHandle> {
        self.job.remote_handle.as_ref()
    }
}

/// Concurrency-safe map of jobs.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the stored job, keeping its latest snapshot.
    pub async fn upsert(&self, job: Job) {
        let mut jobs = self.inner.write().await;
        match jobs.get_mut(&job.id) {
            Some(record) => record.job = job,
            None => {
                jobs.insert(job.id.clone(), JobRecord { job, latest: None });
            }
        }
    }

    pub async fn get(&self, job_id: &JobId) -> Option<JobRecord> {
        self.inner.read().await.get(job_id).cloned()
    }

    pub async fn handle(&self, job_id: &JobId) -> Option<JobHandle> {
        self.inner
            .read()
            .await
            .get(job_id)
            .and_then(|r| r.job.remote_handle.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Jobs that have not reached a terminal state.
    pub async fn active(&self) -> Vec<JobRecord> {
        self.inner
            .read()
            .await
            .values()
            .filter(|r| !r.job.is_terminal())
            .cloned()
            .collect()
    }

    /// Drop finished jobs that ended more than `ttl` ago, then the oldest
    /// finished jobs beyond `max_finished`. Unfinished jobs are always kept.
    ///
    /// Returns the number of records removed.
    pub async fn prune_finished(&self, ttl: Duration, max_finished: usize) -> usize {
        let mut jobs = self.inner.write().await;
        let before = jobs.len();
        let now = Utc::now();

        jobs.retain(|_, record| {
            let Some(finished_at) = record.job.finished_at.filter(|_| record.job.is_terminal()) else {
                return true;
            };
            // A finish time in the future (clock skew) counts as fresh
            now.signed_duration_since(finished_at)
                .to_std()
                .map(|age| age < ttl)
                .unwrap_or(true)
        });

        let mut finished: Vec<_> = jobs
            .values()
            .filter(|r| r.job.is_terminal())
            .map(|r| (r.job.id.clone(), r.job.finished_at.unwrap_or(r.job.updated_at)))
            .collect();
        if finished.len() > max_finished {
            finished.sort_by_key(|(_, t)| *t);
            let excess = finished.len() - max_finished;
            for (id, _) in finished.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }

        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, remaining = jobs.len(), "Pruned finished jobs");
        }
        removed
    }

    /// Cancel other unfinished jobs that share `handle`'s job slot.
    ///
    /// Only happens with fixed slot naming, where a new push replaces
    /// whatever the slot was running.
    pub async fn supersede(&self, handle: &JobHandle, by: &JobId) -> usize {
        let mut jobs = self.inner.write().await;
        let mut superseded = 0;

        for record in jobs.values_mut() {
            let same_slot = record.job.remote_handle.as_ref() == Some(handle);
            if record.job.id == *by || !same_slot || record.job.is_terminal() {
                continue;
            }
            if record.job.transition(JobState::Cancelled).is_ok() {
                let message = format!("Superseded by job {}", by);
                record.latest = Some(
                    StatusSnapshot::from_remote(RemoteState::Cancelled, Some(message.clone()), None)
                        .with_timestamps(record.job.submitted_at, record.job.finished_at),
                );
                record.job.error_message = Some(message);
                superseded += 1;
                debug!(job_id = %record.job.id, superseded_by = %by, "Job superseded");
            }
        }
        superseded
    }

    /// Record a fresh snapshot and advance the job's state from it.
    ///
    /// Once a job is terminal every later snapshot is ignored, so a job
    /// cancelled off a shared slot never picks up its successor's result.
    /// The stored snapshot carries the job's submission and finish timestamps.
    /// Returns the updated record, or `None` for an unknown job.
    pub async fn apply_snapshot(
        &self,
        job_id: &JobId,
        snapshot: StatusSnapshot,
    ) -> Option<JobRecord> {
        let mut jobs = self.inner.write().await;
        let record = jobs.get_mut(job_id)?;

        if record.job.is_terminal() {
            debug!(
                job_id = %job_id,
                state = %record.job.state,
                remote_state = %snapshot.remote_state,
                "Ignoring snapshot for finished job"
            );
            return Some(record.clone());
        }

        if let Some(next) = JobState::from_remote(&snapshot.remote_state) {
            if record.job.transition(next).is_ok()
                && matches!(next, JobState::Failed | JobState::Cancelled)
            {
                record.job.error_message = snapshot.error_message.clone();
            }
        }

        let snapshot = snapshot.with_timestamps(record.job.submitted_at, record.job.finished_at);
        record.latest = Some(snapshot);
        Some(record.clone())
    }
}
