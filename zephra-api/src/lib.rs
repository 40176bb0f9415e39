//! Zephra API - HTTP client for the Zephra dashboard backend.
//!
//! This crate provides a typed HTTP client for every endpoint the client
//! layer consumes: dashboard and location lookups, analytics batches, error
//! reports, push subscription registration, user preference and location
//! updates, and the version check. Every non-2xx response is a failure;
//! gateway errors and connection failures are retried with exponential backoff.

pub mod client;
pub mod endpoints;
pub mod response;

// Re-export key types
pub use client::{ApiClient, RetryConfig};
pub use endpoints::analytics::ErrorReport;
pub use endpoints::version::{VersionCheckRequest, VersionCheckResponse};
pub use response::ApiAck;
