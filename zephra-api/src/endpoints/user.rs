//! User preference and location endpoints.

use zephra_core::error::ZephraResult;

use crate::client::ApiClient;
use crate::response::ApiAck;

impl ApiClient {
    /// `PUT /api/user/preferences`.
    pub async fn update_preferences(&self, preferences: &serde_json::Value) -> ZephraResult<ApiAck> {
        self.put_ack("/api/user/preferences", preferences).await
    }

    /// `POST /api/user/location`.
    pub async fn update_location(&self, location: &serde_json::Value) -> ZephraResult<ApiAck> {
        self.post_ack("/api/user/location", location).await
    }
}
