//! Version check endpoint.

use serde::{Deserialize, Serialize};

use zephra_core::error::ZephraResult;
use zephra_models::AppVersion;

use crate::client::ApiClient;

/// Body of `POST /api/version/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheckRequest {
    pub current_version: String,
    pub build_number: String,
    pub platform: String,
    pub user_agent: String,
}

/// Reply of `POST /api/version/check`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheckResponse {
    #[serde(default)]
    pub update_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<AppVersion>,
}

impl ApiClient {
    /// `POST /api/version/check`.
    pub async fn check_version(&self, request: &VersionCheckRequest) -> ZephraResult<VersionCheckResponse> {
        let body = serde_json::to_value(request)?;
        self.post_json("/api/version/check", &body).await
    }
}
