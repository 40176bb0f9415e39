//! Zephra Models - Client data model, version comparison, and local persistence.
//!
//! This crate owns everything the client keeps between sessions: the SQLite
//! backed key-value store standing in for browser local storage, the sync
//! queue item model and its ordering rules, push subscription records,
//! version metadata and the AQI alert table.

pub mod db;
pub mod schema;
pub mod store;
pub mod models;

// Re-export key types
pub use db::{Database, DbPool};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use models::sync_item::{SyncPriority, SyncQueueItem, SyncType};
pub use models::push::{NotificationPayload, PermissionState, PushKeys, PushSubscriptionData};
pub use models::version::{compare_versions, AppVersion, UpdateInfo, VersionHistoryEntry};
pub use models::alert::{AlertDescriptor, AlertLevel, AlertSetting, HealthProfile, UserPreferences};
pub use models::dashboard::{DashboardData, DashboardQuery, Location, LocationsResponse};
