//! Capability ports the managers depend on.
//!
//! Each trait stands in for one platform capability (network delivery, the
//! caching worker, push, notifications, version checks, geolocation) so the
//! orchestration logic runs on any tokio runtime and can be driven by test
//! doubles. HTTP-backed implementations live in [`crate::http`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use zephra_api::{ErrorReport, VersionCheckRequest, VersionCheckResponse};
use zephra_core::error::ZephraResult;
use zephra_models::{NotificationPayload, PermissionState, PushSubscriptionData, SyncQueueItem};

/// Delivers one queued operation to the backend.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn deliver(&self, item: &SyncQueueItem) -> ZephraResult<()>;
}

/// Request posted to the caching worker over its message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    GetCacheStats,
    /// Delete one named cache, or every cache when `name` is `None`.
    ClearCache { name: Option<String> },
    /// Store a response body in a named cache.
    Store { cache: String, key: String, body: Vec<u8> },
    GetVersion,
}

/// Reply from the caching worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerReply {
    CacheStats(CacheStats),
    Cleared { caches: Vec<String> },
    Stored,
    Version { version: String },
    Error { message: String },
}

/// Size of one named cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub name: String,
    pub entries: usize,
    pub bytes: u64,
}

/// Sizes of every cache the worker owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub caches: Vec<CacheInfo>,
    pub total_entries: usize,
    pub total_bytes: u64,
}

impl CacheStats {
    pub fn from_caches(caches: Vec<CacheInfo>) -> Self {
        let total_entries = caches.iter().map(|c| c.entries).sum();
        let total_bytes = caches.iter().map(|c| c.bytes).sum();
        Self { caches, total_entries, total_bytes }
    }
}

/// Result of registering the caching worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRegistration {
    pub script_url: String,
    pub scope: String,
    pub active_version: Option<String>,
}

/// Lifecycle notifications raised by the worker host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerHostEvent {
    /// A worker finished installing. `waiting` is set when an older worker
    /// still controls the client and the new one must wait to activate.
    Installed { waiting: bool },
    /// A different worker now controls the client.
    ControllerChanged,
}

/// The platform hosting the caching worker.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn register(&self, script_url: &str, scope: &str) -> ZephraResult<WorkerRegistration>;

    /// Re-fetch the worker script, installing a newer one if present.
    async fn update(&self) -> ZephraResult<()>;

    fn has_waiting(&self) -> bool;

    fn has_controller(&self) -> bool;

    /// Ask the waiting worker to activate immediately.
    async fn skip_waiting(&self) -> ZephraResult<()>;

    async fn post_message(&self, request: WorkerRequest) -> ZephraResult<WorkerReply>;

    fn subscribe(&self) -> broadcast::Receiver<WorkerHostEvent>;
}

/// Platform push and notification-permission capability.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn is_supported(&self) -> bool;

    fn permission(&self) -> PermissionState;

    /// Prompt the user. Resolves with the decision.
    async fn request_permission(&self) -> ZephraResult<PermissionState>;

    async fn subscribe(&self, application_server_key: &str) -> ZephraResult<PushSubscriptionData>;

    async fn current_subscription(&self) -> ZephraResult<Option<PushSubscriptionData>>;

    /// Tear down the platform subscription. Returns whether one existed.
    async fn unsubscribe(&self) -> ZephraResult<bool>;
}

/// Backend copy of the push subscription.
#[async_trait]
pub trait PushRegistry: Send + Sync {
    async fn register(&self, subscription: &PushSubscriptionData) -> ZephraResult<()>;

    async fn unregister(&self, endpoint: &str) -> ZephraResult<()>;
}

/// Displays notifications to the user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, payload: &NotificationPayload) -> ZephraResult<()>;
}

/// Source of release information.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn check_version(&self, request: &VersionCheckRequest) -> ZephraResult<VersionCheckResponse>;
}

/// Destination for client error reports.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, report: &ErrorReport) -> ZephraResult<()>;
}

/// A resolved geographic position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Geolocation capability.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> ZephraResult<Position>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_totals() {
        let stats = CacheStats::from_caches(vec![
            CacheInfo { name: "zephra-api".into(), entries: 3, bytes: 300 },
            CacheInfo { name: "zephra-images".into(), entries: 2, bytes: 2048 },
        ]);
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.total_bytes, 2348);
    }

    #[test]
    fn test_worker_message_wire_format() {
        let value = serde_json::to_value(WorkerRequest::ClearCache { name: None }).unwrap();
        assert_eq!(value["type"], "CLEAR_CACHE");

        let reply: WorkerReply =
            serde_json::from_str(r#"{"type":"ERROR","message":"cache not found"}"#).unwrap();
        assert_eq!(reply, WorkerReply::Error { message: "cache not found".into() });
    }
}
