//! Job orchestration for remote music video generation.
//!
//! This crate provides:
//! - Job submission: validation, input and job slot pushes, registration
//! - Status reconciliation from remote platform states to UI snapshots
//! - Output retrieval with an authenticated streaming proxy
//! - A concurrency-safe job registry and cancellable status polling

pub mod config;
pub mod definition;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod retriever;
pub mod submission;


pub use config::{JobsConfig, SlotNaming};
pub use definition::{load_runner_source, JobDefinition, DEFAULT_RUNNER_SOURCE};
pub use error::{JobError, JobResult};
pub use logging::JobLogger;
pub use poller::{PollTask, StatusPoller};
pub use reconciler::StatusReconciler;
pub use registry::{JobRecord, JobRegistry};
pub use retriever::{content_type_for, OutputArtifact, OutputRetriever};
pub use submission::{InputAsset, JobSubmissionService, SubmittedJob};
