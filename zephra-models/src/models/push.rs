//! Push subscription and notification records.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use zephra_core::error::{ZephraError, ZephraResult};

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not yet decided by the user.
    #[default]
    Default,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Default => "default",
        }
    }
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encryption keys of a push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Normalized push subscription, mirrored to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionData {
    pub endpoint: String,
    pub keys: PushKeys,
}

impl PushSubscriptionData {
    /// Check the endpoint is present and both keys decode as base64url.
    pub fn validate(&self) -> ZephraResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ZephraError::Push("subscription endpoint is empty".into()));
        }
        decode_base64url(&self.keys.p256dh)
            .map_err(|e| ZephraError::Push(format!("invalid p256dh key: {e}")))?;
        decode_base64url(&self.keys.auth)
            .map_err(|e| ZephraError::Push(format!("invalid auth key: {e}")))?;
        Ok(())
    }
}

/// Decode base64url with or without trailing padding.
pub fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = value.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(base64::DecodeError::InvalidLength(0));
    }
    URL_SAFE_NO_PAD.decode(trimmed)
}

/// Content of a user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub requires_interaction: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            tag: None,
            requires_interaction: false,
            data: serde_json::Value::Null,
        }
    }
}
