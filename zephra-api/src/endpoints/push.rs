//! Push subscription registration endpoints.

use zephra_core::error::ZephraResult;
use zephra_models::PushSubscriptionData;

use crate::client::ApiClient;
use crate::response::ApiAck;

impl ApiClient {
    /// `POST /api/push/subscribe` with the normalized subscription.
    pub async fn push_subscribe(&self, subscription: &PushSubscriptionData) -> ZephraResult<ApiAck> {
        let body = serde_json::to_value(subscription)?;
        self.post_ack("/api/push/subscribe", &body).await
    }

    /// `POST /api/push/unsubscribe` for the given endpoint.
    pub async fn push_unsubscribe(&self, endpoint: &str) -> ZephraResult<ApiAck> {
        let body = serde_json::json!({ "endpoint": endpoint });
        self.post_ack("/api/push/unsubscribe", &body).await
    }
}
