//! Zephra Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Zephra crates:
//! - Application configuration (API endpoint, sync policy, worker, push, updates)
//! - Global error type covering all error categories
//! - Structured logging with tracing
//! - Platform detection utilities
//! - Storage keys and timing constants

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{ZephraError, ZephraResult};
pub use logging::init_logging;
pub use platform::Platform;
