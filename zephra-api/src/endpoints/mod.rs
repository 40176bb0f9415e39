//! API endpoint modules organized by category.
//!
//! Each module provides typed methods for a group of related backend endpoints.

pub mod server;
pub mod dashboard;
pub mod analytics;
pub mod push;
pub mod user;
pub mod version;
