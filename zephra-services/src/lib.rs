//! Zephra Services - Offline sync and service orchestration.
//!
//! This crate provides the service trait, the service registry, and the
//! managers that keep the client usable offline:
//! - Background sync (persisted priority queue, exponential backoff, expiry)
//! - Caching worker lifecycle (registration, update polling, cache control)
//! - Push notifications (permission, subscription, AQI alerts)
//! - App updates (version checks, activation, install history)
//! - Service manager façade composing the four
//! - Event bus (typed notifications to the UI and between managers)
//!
//! Platform capabilities are reached through the traits in [`ports`];
//! [`http`], [`local_worker`] and [`notification`] hold the desktop
//! implementations.

pub mod service;
pub mod registry;
pub mod event_bus;
pub mod network;
pub mod ports;
pub mod queue_store;
pub mod sync;
pub mod local_worker;
pub mod worker;
pub mod notification;
pub mod push;
pub mod update;
pub mod http;
pub mod manager;

// Re-export key types
pub use service::{Service, ServiceState};
pub use registry::{InitReport, ServiceHealth, ServiceRegistry};
pub use event_bus::{AppEvent, EventBus};
pub use network::NetworkMonitor;
pub use queue_store::QueueStore;
pub use sync::{BackgroundSyncService, QueueOptions, QueueStatus, SyncPolicy};
pub use local_worker::LocalWorker;
pub use worker::{ServiceWorkerService, WorkerSettings, WorkerStatus};
pub use notification::{DesktopNotifier, DesktopPushPlatform};
pub use push::{PushService, PushStatus};
pub use update::{AppUpdateService, UpdateSettings, UpdateStatus};
pub use manager::{AirQualityOutcome, AirQualityUpdate, ServiceDeps, ServiceManager, ServiceStatus};
