//! Desktop notification and push capability.
//!
//! `DesktopNotifier` renders notifications through the OS notification
//! center. Desktop hosts have no web push service, so `DesktopPushPlatform`
//! grants notification permission locally and reports push subscription as
//! unsupported; notifications raised by the client itself still work.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use zephra_core::constants::APP_NAME;
use zephra_core::error::{ZephraError, ZephraResult};
use zephra_models::{NotificationPayload, PermissionState, PushSubscriptionData};

use crate::ports::{NotificationSink, PushPlatform};

/// Shows notifications with `notify-rust`.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for DesktopNotifier {
    async fn show(&self, payload: &NotificationPayload) -> ZephraResult<()> {
        debug!("showing notification: {}", payload.title);

        #[cfg(not(test))]
        {
            let mut notification = notify_rust::Notification::new();
            notification
                .summary(&payload.title)
                .body(&payload.body)
                .appname(APP_NAME);
            if let Some(icon) = &payload.icon {
                notification.icon(icon);
            }
            if payload.requires_interaction {
                notification.timeout(notify_rust::Timeout::Never);
            }
            notification
                .show()
                .map_err(|e| ZephraError::Notification(e.to_string()))?;
        }

        let _ = APP_NAME;
        Ok(())
    }
}

/// Permission-only push platform for desktop hosts.
#[derive(Debug)]
pub struct DesktopPushPlatform {
    permission: Mutex<PermissionState>,
}

impl DesktopPushPlatform {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(PermissionState::Default),
        }
    }

    /// Start with a previously recorded decision.
    pub fn with_permission(permission: PermissionState) -> Self {
        Self {
            permission: Mutex::new(permission),
        }
    }
}

impl Default for DesktopPushPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushPlatform for DesktopPushPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> PermissionState {
        self.permission
            .lock()
            .map(|p| *p)
            .unwrap_or(PermissionState::Default)
    }

    async fn request_permission(&self) -> ZephraResult<PermissionState> {
        let mut permission = self
            .permission
            .lock()
            .map_err(|_| ZephraError::Internal("permission lock poisoned".into()))?;
        if *permission == PermissionState::Default {
            *permission = PermissionState::Granted;
            info!("desktop notifications enabled");
        }
        Ok(*permission)
    }

    async fn subscribe(&self, _application_server_key: &str) -> ZephraResult<PushSubscriptionData> {
        Err(ZephraError::Unsupported("web push is not available on desktop".into()))
    }

    async fn current_subscription(&self) -> ZephraResult<Option<PushSubscriptionData>> {
        Ok(None)
    }

    async fn unsubscribe(&self) -> ZephraResult<bool> {
        Ok(false)
    }
}
