//! Server reachability endpoints.

use std::time::{Duration, Instant};

use zephra_core::error::{ZephraError, ZephraResult};

use crate::client::ApiClient;
use crate::response::PingResponse;

impl ApiClient {
    /// Ping the backend. Returns the round-trip latency.
    pub async fn ping(&self) -> ZephraResult<Duration> {
        let start = Instant::now();
        let resp: PingResponse = self.get_json("/ping", &[]).await?;
        if resp.ping == "pong" {
            Ok(start.elapsed())
        } else {
            Err(ZephraError::Http(format!("unexpected ping reply: {}", resp.ping)))
        }
    }
}
