//! REST client for the remote batch execution platform.
//!
//! This crate provides:
//! - An authenticated, pooled HTTP client for slot, status and output calls
//! - The versioned artifact client that creates or revises named slots
//! - Wire types for the platform's JSON API
//! - Request metrics by operation and status

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod slots;
pub mod types;


pub use client::{ByteStream, PlatformClient, RemoteFile};
pub use config::PlatformConfig;
pub use error::{PlatformError, PlatformResult, SlotAction, SlotStep};
pub use slots::{JobSlotPayload, ResourceRequirements, SlotClient, SlotFile};
pub use types::{JobStatusResponse, OutputFile, OutputListing, PushResponse};
