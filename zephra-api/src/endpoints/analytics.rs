//! Analytics and client error reporting endpoints.

use serde::{Deserialize, Serialize};

use zephra_core::error::ZephraResult;

use crate::client::ApiClient;
use crate::response::ApiAck;

/// Client-side error forwarded to `POST /api/errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub context: String,
    pub message: String,
    pub platform: String,
    pub app_version: String,
    /// RFC 3339 time of the failure.
    pub timestamp: String,
}

impl ErrorReport {
    pub fn new(context: impl Into<String>, message: impl Into<String>, platform: &str, app_version: &str) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            platform: platform.to_string(),
            app_version: app_version.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl ApiClient {
    /// `POST /api/analytics/batch` with `{"events": [...]}`.
    pub async fn send_analytics_batch(&self, events: &[serde_json::Value]) -> ZephraResult<ApiAck> {
        let body = serde_json::json!({ "events": events });
        self.post_ack("/api/analytics/batch", &body).await
    }

    /// `POST /api/errors`.
    pub async fn report_error(&self, report: &ErrorReport) -> ZephraResult<ApiAck> {
        let body = serde_json::to_value(report)?;
        self.post_ack("/api/errors", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_report_wire_format() {
        let report = ErrorReport::new("sync", "boom", "linux", "0.1.0");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["context"], "sync");
        assert_eq!(value["appVersion"], "0.1.0");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
