//! Background status polling.
//!
//! A cancellable task that polls one job at a fixed interval, feeds each
//! snapshot into the registry and stops once the remote job is terminal.
//! Failed polls are logged and the loop carries on at the next tick.

use std::time::Duration;

use mvgen_models::{JobHandle, JobId, StatusSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn, Instrument};

use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::metrics::{record_finished, record_poll};
use crate::reconciler::StatusReconciler;
use crate::registry::JobRegistry;

/// Handle to a running poll task.
pub struct PollTask {
    cancel: watch::Sender<bool>,
    task: JoinHandle<Option<StatusSnapshot>>,
}

impl PollTask {
    /// Ask the task to stop after its current poll.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task; returns the terminal snapshot if one was reached.
    pub async fn join(self) -> Option<StatusSnapshot> {
        self.task.await.ok().flatten()
    }
}

/// Polls jobs until they finish.
#[derive(Clone)]
pub struct StatusPoller {
    reconciler: StatusReconciler,
    registry: JobRegistry,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(reconciler: StatusReconciler, registry: JobRegistry, interval: Duration) -> Self {
        Self {
            reconciler,
            registry,
            interval,
        }
    }

    /// Spawn a poll loop for one job.
    ///
    /// Dropping the returned [`PollTask`] detaches the loop; it then runs
    /// until the job is terminal.
    pub fn spawn(&self, job_id: JobId, handle: JobHandle) -> PollTask {
        let (cancel, cancel_rx) = watch::channel(false);
        let poller = self.clone();
        let span = JobLogger::new(&job_id, "poll").create_span();

        let task = tokio::spawn(
            async move { poller.run(&job_id, &handle, cancel_rx).await }.instrument(span),
        );

        PollTask { cancel, task }
    }

    /// Poll until terminal or cancelled.
    pub async fn run(
        &self,
        job_id: &JobId,
        handle: &JobHandle,
        mut cancel: watch::Receiver<bool>,
    ) -> Option<StatusSnapshot> {
        let logger = JobLogger::new(job_id, "poll");
        logger.started(&format!("{} every {:?}", handle, self.interval));

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancel_open = true;

        loop {
            tokio::select! {
                changed = cancel.changed(), if cancel_open => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            logger.progress("polling cancelled");
                            return None;
                        }
                        Ok(()) => {}
                        // Sender dropped: keep polling detached.
                        Err(_) => cancel_open = false,
                    }
                }
                _ = ticker.tick() => {
                    match self.poll_once(job_id, handle).await {
                        Ok(snapshot) if snapshot.done => {
                            record_finished(snapshot.remote_state.as_str());
                            if snapshot.errored {
                                logger.warning(&format!(
                                    "remote job ended in {}",
                                    snapshot.remote_state
                                ));
                            } else {
                                logger.finished("remote job complete");
                            }
                            return Some(snapshot);
                        }
                        Ok(snapshot) => {
                            logger.progress(&format!(
                                "{} ({}%)",
                                snapshot.ui_stage, snapshot.progress_percent
                            ));
                        }
                        Err(e) => {
                            warn!(
                                job_id = %job_id,
                                transient = e.is_transient(),
                                "Status poll failed, retrying next tick: {}", e
                            );
                        }
                    }
                }
            }
        }
    }

    /// Poll until terminal, turning a failed or cancelled remote job into
    /// [`JobError::RemoteJobFailed`].
    pub async fn wait_for_terminal(
        &self,
        job_id: &JobId,
        handle: &JobHandle,
    ) -> JobResult<StatusSnapshot> {
        let (_cancel, cancel_rx) = watch::channel(false);
        let snapshot = self
            .run(job_id, handle, cancel_rx)
            .await
            .ok_or(JobError::PollingCancelled)?;

        if snapshot.errored {
            return Err(JobError::RemoteJobFailed {
                state: snapshot.remote_state.clone(),
                message: snapshot.error_message.clone().unwrap_or_default(),
            });
        }

        info!(job_id = %job_id, "Remote job finished");
        Ok(snapshot)
    }

    /// One poll, applied to the registry.
    pub async fn poll_once(&self, job_id: &JobId, handle: &JobHandle) -> JobResult<StatusSnapshot> {
        let snapshot = match self.reconciler.poll(handle).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                record_poll("error");
                return Err(e);
            }
        };
        record_poll("ok");

        let snapshot = match self.registry.apply_snapshot(job_id, snapshot.clone()).await {
            Some(record) => record.latest.unwrap_or(snapshot),
            None => snapshot,
        };
        Ok(snapshot)
    }
}
