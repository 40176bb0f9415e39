//! Response types shared across endpoints.

use serde::{Deserialize, Serialize};

use zephra_core::error::{ZephraError, ZephraResult};

/// Acknowledgement body of write endpoints.
///
/// The backend answers writes with `{ "success": true, ... }`, sometimes
/// with an empty body. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ApiAck {
    /// Parse an acknowledgement body; an empty body acknowledges.
    pub fn from_body(body: &str) -> ZephraResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(body)
            .map_err(|e| ZephraError::Serialization(format!("failed to parse response: {e}")))
    }

    /// A body explicitly reporting `success: false` is a failure.
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(true)
    }
}

/// Response of `GET /ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub ping: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
