//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job submission with multipart audio upload
//! - Live status snapshots and a streaming download proxy
//! - Background status polling per submitted job
//! - Security headers, CORS and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
