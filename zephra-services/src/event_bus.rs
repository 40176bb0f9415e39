//! Typed event bus for service-to-UI and service-to-service notifications.
//!
//! Uses tokio broadcast channels so any number of listeners can follow the
//! managers without registering callbacks on them. Every subscriber gets
//! every event.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use zephra_models::{PermissionState, SyncPriority, SyncType};

/// All application-level events emitted by the managers.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Network connectivity flipped.
    NetworkChanged {
        online: bool,
    },
    /// An operation was added to the background sync queue.
    SyncItemQueued {
        id: String,
        sync_type: SyncType,
        priority: SyncPriority,
    },
    /// A queued operation was delivered and removed.
    SyncItemCompleted {
        id: String,
        sync_type: SyncType,
    },
    /// Delivery failed and a retry timer was armed.
    SyncRetryScheduled {
        id: String,
        retry_count: u32,
        delay_ms: u64,
    },
    /// Delivery failed for the last allowed time; the item is gone.
    SyncItemDropped {
        id: String,
        sync_type: SyncType,
        error: String,
    },
    /// Expired items were purged before a drain.
    SyncItemsExpired {
        count: usize,
    },
    /// The queue was emptied on request.
    SyncQueueCleared {
        count: usize,
    },
    /// The caching worker was registered.
    WorkerRegistered {
        scope: String,
    },
    /// A new worker version is installed and waiting.
    WorkerUpdateAvailable,
    /// A new worker version took control.
    WorkerActivated,
    /// The host should reload to run under the new worker.
    ReloadRequested,
    /// Caches were deleted.
    CacheCleared {
        caches: Vec<String>,
    },
    /// Notification permission changed.
    PermissionChanged {
        permission: PermissionState,
    },
    /// A push subscription was created and uploaded.
    PushSubscribed {
        endpoint: String,
    },
    /// The push subscription was torn down.
    PushUnsubscribed {
        endpoint: String,
    },
    /// A notification was displayed.
    NotificationShown {
        title: String,
        tag: Option<String>,
    },
    /// A notification could not be displayed.
    NotificationError {
        error: String,
    },
    /// The version endpoint reported a newer release.
    AppUpdateAvailable {
        current_version: String,
        available_version: String,
        critical: bool,
    },
    /// A new app version was installed.
    AppUpdateInstalled {
        version: String,
        previous_version: String,
    },
    /// Installing an app update failed.
    AppUpdateFailed {
        error: String,
    },
    /// A manager failed to initialize.
    ServiceFailed {
        service: String,
        error: String,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Slow subscribers that fall behind receive a `Lagged` error and may
/// miss events, which is acceptable for UI-driven consumers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Human-readable label for an event (for logging).
pub fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::NetworkChanged { .. } => "NetworkChanged",
        AppEvent::SyncItemQueued { .. } => "SyncItemQueued",
        AppEvent::SyncItemCompleted { .. } => "SyncItemCompleted",
        AppEvent::SyncRetryScheduled { .. } => "SyncRetryScheduled",
        AppEvent::SyncItemDropped { .. } => "SyncItemDropped",
        AppEvent::SyncItemsExpired { .. } => "SyncItemsExpired",
        AppEvent::SyncQueueCleared { .. } => "SyncQueueCleared",
        AppEvent::WorkerRegistered { .. } => "WorkerRegistered",
        AppEvent::WorkerUpdateAvailable => "WorkerUpdateAvailable",
        AppEvent::WorkerActivated => "WorkerActivated",
        AppEvent::ReloadRequested => "ReloadRequested",
        AppEvent::CacheCleared { .. } => "CacheCleared",
        AppEvent::PermissionChanged { .. } => "PermissionChanged",
        AppEvent::PushSubscribed { .. } => "PushSubscribed",
        AppEvent::PushUnsubscribed { .. } => "PushUnsubscribed",
        AppEvent::NotificationShown { .. } => "NotificationShown",
        AppEvent::NotificationError { .. } => "NotificationError",
        AppEvent::AppUpdateAvailable { .. } => "AppUpdateAvailable",
        AppEvent::AppUpdateInstalled { .. } => "AppUpdateInstalled",
        AppEvent::AppUpdateFailed { .. } => "AppUpdateFailed",
        AppEvent::ServiceFailed { .. } => "ServiceFailed",
    }
}
