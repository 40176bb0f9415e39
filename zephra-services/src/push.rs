//! Push notification handler.
//!
//! Owns notification permission and the push subscription: subscribing
//! creates a platform subscription keyed by the configured VAPID public key
//! and uploads it to the backend; unsubscribing tears both copies down.
//! Notifications are only shown with an active worker registration and a
//! granted permission; anything else is reported as a `NotificationError`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use zephra_core::error::{ZephraError, ZephraResult};
use zephra_models::models::push::decode_base64url;
use zephra_models::{AlertLevel, NotificationPayload, PermissionState, PushSubscriptionData};

use crate::event_bus::{AppEvent, EventBus};
use crate::ports::{NotificationSink, PushPlatform, PushRegistry};
use crate::service::{Service, ServiceState, StateCell};

/// Tag shared by AQI alerts so a newer alert replaces the previous one.
pub const AQI_ALERT_TAG: &str = "aqi-alert";

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatus {
    pub supported: bool,
    pub permission: PermissionState,
    pub subscribed: bool,
    pub endpoint: Option<String>,
}

struct PushInner {
    state: StateCell,
    platform: Arc<dyn PushPlatform>,
    registry: Arc<dyn PushRegistry>,
    notifier: Arc<dyn NotificationSink>,
    event_bus: EventBus,
    vapid_public_key: String,
    supported: AtomicBool,
    registration_active: AtomicBool,
    subscription: Mutex<Option<PushSubscriptionData>>,
}

/// Manager for notification permission, push subscription and display.
#[derive(Clone)]
pub struct PushService {
    inner: Arc<PushInner>,
}

impl PushService {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        registry: Arc<dyn PushRegistry>,
        notifier: Arc<dyn NotificationSink>,
        vapid_public_key: impl Into<String>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(PushInner {
                state: StateCell::default(),
                platform,
                registry,
                notifier,
                event_bus,
                vapid_public_key: vapid_public_key.into(),
                supported: AtomicBool::new(true),
                registration_active: AtomicBool::new(false),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.inner.supported.load(Ordering::SeqCst)
    }

    /// Whether a caching worker registration is available to show
    /// notifications through.
    pub fn set_registration_active(&self, active: bool) {
        self.inner.registration_active.store(active, Ordering::SeqCst);
    }

    pub fn permission(&self) -> PermissionState {
        if !self.is_supported() {
            return PermissionState::Denied;
        }
        self.inner.platform.permission()
    }

    pub fn subscription(&self) -> Option<PushSubscriptionData> {
        self.inner.subscription.lock().ok().and_then(|s| s.clone())
    }

    /// Ask for notification permission.
    ///
    /// Once granted no further prompt is shown. A denial is final.
    pub async fn request_permission(&self) -> ZephraResult<PermissionState> {
        if !self.is_supported() {
            return Ok(PermissionState::Denied);
        }

        let current = self.inner.platform.permission();
        if current != PermissionState::Default {
            return Ok(current);
        }

        let decided = self.inner.platform.request_permission().await?;
        if decided != current {
            info!("notification permission: {}", decided.as_str());
            self.inner.event_bus.emit(AppEvent::PermissionChanged { permission: decided });
        }
        Ok(decided)
    }

    /// Create a push subscription and register it with the backend.
    ///
    /// Returns `None` when permission is refused or push is unsupported.
    pub async fn subscribe(&self) -> ZephraResult<Option<PushSubscriptionData>> {
        if !self.is_supported() {
            return Ok(None);
        }

        if self.request_permission().await? != PermissionState::Granted {
            info!("notification permission not granted, skipping push subscription");
            return Ok(None);
        }

        let key = self.inner.vapid_public_key.trim();
        if key.is_empty() {
            return Err(ZephraError::MissingConfig("push.vapid_public_key".into()));
        }
        decode_base64url(key)
            .map_err(|e| ZephraError::Push(format!("invalid application server key: {e}")))?;

        let subscription = self.inner.platform.subscribe(key).await?;
        subscription.validate()?;
        self.inner.registry.register(&subscription).await?;

        if let Ok(mut slot) = self.inner.subscription.lock() {
            *slot = Some(subscription.clone());
        }
        info!("push subscription registered: {}", subscription.endpoint);
        self.inner.event_bus.emit(AppEvent::PushSubscribed {
            endpoint: subscription.endpoint.clone(),
        });
        Ok(Some(subscription))
    }

    /// Remove the platform subscription and its backend copy.
    ///
    /// Returns false when there was nothing to remove.
    pub async fn unsubscribe(&self) -> ZephraResult<bool> {
        if !self.is_supported() {
            return Ok(false);
        }

        // The local record is only dropped once the platform lets go.
        let stored = self.inner.subscription.lock().ok().and_then(|s| s.clone());
        let endpoint = match stored {
            Some(sub) => Some(sub.endpoint),
            None => self
                .inner
                .platform
                .current_subscription()
                .await?
                .map(|sub| sub.endpoint),
        };

        let removed = self.inner.platform.unsubscribe().await?;
        if let Ok(mut slot) = self.inner.subscription.lock() {
            slot.take();
        }
        let Some(endpoint) = endpoint else {
            if removed {
                debug!("removed platform subscription with unknown endpoint");
            }
            return Ok(removed);
        };

        if let Err(e) = self.inner.registry.unregister(&endpoint).await {
            warn!("failed to remove push subscription from server: {e}");
        }
        info!("push subscription removed: {endpoint}");
        self.inner.event_bus.emit(AppEvent::PushUnsubscribed { endpoint });
        Ok(true)
    }

    /// Display a notification.
    pub async fn show_notification(&self, payload: &NotificationPayload) -> ZephraResult<()> {
        let result = self.try_show(payload).await;
        match &result {
            Ok(()) => self.inner.event_bus.emit(AppEvent::NotificationShown {
                title: payload.title.clone(),
                tag: payload.tag.clone(),
            }),
            Err(e) => {
                warn!("notification failed: {e}");
                self.inner.event_bus.emit(AppEvent::NotificationError { error: e.to_string() });
            }
        }
        result
    }

    async fn try_show(&self, payload: &NotificationPayload) -> ZephraResult<()> {
        if !self.is_supported() {
            return Err(ZephraError::Unsupported("notifications".into()));
        }
        if !self.inner.registration_active.load(Ordering::SeqCst) {
            return Err(ZephraError::Notification("no active worker registration".into()));
        }
        if self.inner.platform.permission() != PermissionState::Granted {
            return Err(ZephraError::PermissionDenied("notifications".into()));
        }
        self.inner.notifier.show(payload).await
    }

    /// Build the alert notification for an AQI reading.
    pub fn air_quality_notification(aqi: f64, location: &str) -> NotificationPayload {
        let level = AlertLevel::from_aqi(aqi);
        let descriptor = level.descriptor();
        NotificationPayload {
            title: format!("Air Quality Alert: {}", descriptor.label),
            body: format!("AQI {aqi:.0} in {location}. {}", descriptor.action),
            icon: Some(descriptor.icon.to_string()),
            tag: Some(AQI_ALERT_TAG.to_string()),
            requires_interaction: level.requires_interaction(),
            data: json!({
                "aqi": aqi,
                "location": location,
                "level": level,
                "severity": descriptor.severity,
                "color": descriptor.color,
            }),
        }
    }

    pub fn push_status(&self) -> PushStatus {
        let endpoint = self.subscription().map(|s| s.endpoint);
        PushStatus {
            supported: self.is_supported(),
            permission: self.permission(),
            subscribed: endpoint.is_some(),
            endpoint,
        }
    }
}

#[async_trait]
impl Service for PushService {
    fn name(&self) -> &str {
        "push_notifications"
    }

    fn state(&self) -> ServiceState {
        self.inner.state.get()
    }

    async fn init(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::Initializing);

        if !self.inner.platform.is_supported() {
            warn!("notifications not supported on this host");
            self.inner.supported.store(false, Ordering::SeqCst);
            self.inner.state.set(ServiceState::Running);
            return Ok(());
        }

        match self.inner.platform.current_subscription().await {
            Ok(Some(existing)) => {
                debug!("restored push subscription {}", existing.endpoint);
                if let Ok(mut slot) = self.inner.subscription.lock() {
                    *slot = Some(existing);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("could not read existing push subscription: {e}"),
        }

        info!("push service initialized, permission={}", self.inner.platform.permission().as_str());
        self.inner.state.set(ServiceState::Running);
        Ok(())
    }

    async fn shutdown(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::Stopped);
        Ok(())
    }
}
