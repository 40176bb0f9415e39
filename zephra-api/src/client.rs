//! HTTP client for the Zephra dashboard API.
//!
//! Handles custom headers, timeout management, exponential backoff retry,
//! and status checking. Any non-2xx response is surfaced as an error.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use zephra_core::config::{ApiConfig, AppConfig};
use zephra_core::constants;
use zephra_core::error::{ZephraError, ZephraResult};

use crate::response::ApiAck;

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// No retries; used where the caller has its own retry policy.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// HTTP client for communicating with the Zephra backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL without trailing slash (e.g. "https://zephra-api.onrender.com").
    base_url: String,
    /// Default request timeout.
    timeout: Duration,
    /// Custom headers from config.
    custom_headers: Vec<(String, String)>,
    /// Retry configuration.
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new ApiClient from API configuration.
    pub fn new(config: &ApiConfig) -> ZephraResult<Self> {
        let base_url = AppConfig::sanitize_base_url(&config.base_url);
        if base_url.is_empty() {
            return Err(ZephraError::MissingConfig("api.base_url".into()));
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(constants::USER_AGENT)
            .build()
            .map_err(|e| ZephraError::Http(format!("failed to build HTTP client: {e}")))?;

        let mut custom_headers: Vec<(String, String)> = config
            .custom_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        custom_headers.sort();

        Ok(Self {
            inner,
            base_url,
            timeout,
            custom_headers,
            retry_config: RetryConfig::default(),
        })
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Get the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Apply custom headers to a request builder.
    fn apply_headers(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (key, value) in &self.custom_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, url).timeout(self.timeout);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(b) = body {
            builder = builder.json(b);
        }
        self.apply_headers(builder)
    }

    /// Execute a request with exponential backoff retry.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> ZephraResult<Response> {
        let url = self.url(path);
        debug!("{} {}", method, path);

        let mut last_error: Option<ZephraError> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.calculate_retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self.build_request(method.clone(), &url, query, body);

            match builder.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if self.retry_config.retryable_statuses.contains(&status)
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status, path);
                        last_error = Some(ZephraError::ServerError {
                            status,
                            message: format!("retryable status {status}"),
                        });
                        continue;
                    }

                    return Self::check_status(response).await;
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = Self::classify_error(e);

                    if is_retryable && attempt < self.retry_config.max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ZephraError::Http("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    // --- Public HTTP methods ---

    /// Execute a GET request with automatic retry.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> ZephraResult<Response> {
        self.request_with_retry(Method::GET, path, query, None).await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> ZephraResult<Response> {
        self.request_with_retry(Method::POST, path, &[], Some(body)).await
    }

    /// Execute a PUT request with a JSON body.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> ZephraResult<Response> {
        self.request_with_retry(Method::PUT, path, &[], Some(body)).await
    }

    // --- Response helpers ---

    /// Deserialize a response body.
    pub async fn parse_response<T: DeserializeOwned>(response: Response) -> ZephraResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ZephraError::Serialization(format!("failed to parse response: {e}")))
    }

    /// Read a write acknowledgement; `success: false` is a failure.
    pub async fn parse_ack(response: Response) -> ZephraResult<ApiAck> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ZephraError::Http(format!("failed to read response body: {e}")))?;
        let ack = ApiAck::from_body(&body)?;
        if !ack.is_success() {
            return Err(ZephraError::ServerError {
                status,
                message: ack.message.unwrap_or_else(|| "request rejected".into()),
            });
        }
        Ok(ack)
    }

    /// Convenience: GET + parse.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ZephraResult<T> {
        let resp = self.get(path, query).await?;
        Self::parse_response(resp).await
    }

    /// Convenience: POST + parse.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ZephraResult<T> {
        let resp = self.post(path, body).await?;
        Self::parse_response(resp).await
    }

    /// Convenience: POST + acknowledgement.
    pub async fn post_ack(&self, path: &str, body: &serde_json::Value) -> ZephraResult<ApiAck> {
        let resp = self.post(path, body).await?;
        Self::parse_ack(resp).await
    }

    /// Convenience: PUT + acknowledgement.
    pub async fn put_ack(&self, path: &str, body: &serde_json::Value) -> ZephraResult<ApiAck> {
        let resp = self.put(path, body).await?;
        Self::parse_ack(resp).await
    }

    /// Convert any non-2xx status into an error carrying the body.
    async fn check_status(response: Response) -> ZephraResult<Response> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZephraError::ServerError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into a ZephraError variant.
    fn classify_error(e: reqwest::Error) -> ZephraError {
        if e.is_timeout() {
            ZephraError::Timeout(e.to_string())
        } else if e.is_connect() {
            ZephraError::Http(format!("connection failed: {e}"))
        } else {
            ZephraError::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            base_url: "localhost:10000/".into(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_base_url_is_sanitized() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:10000");
        assert_eq!(client.url("/api/locations"), "http://localhost:10000/api/locations");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = ApiConfig { base_url: "  ".into(), ..ApiConfig::default() };
        assert!(matches!(ApiClient::new(&config), Err(ZephraError::MissingConfig(_))));
    }

    #[test]
    fn test_retry_delay_calculation() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(client.calculate_retry_delay(1), Duration::from_secs(2));
        assert_eq!(client.calculate_retry_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_delay_capped() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.calculate_retry_delay(10), Duration::from_secs(4));
        assert_eq!(client.calculate_retry_delay(80), Duration::from_secs(4));
    }

    #[test]
    fn test_custom_headers_applied_in_stable_order() {
        let mut config = test_config();
        config.custom_headers.insert("X-Client".into(), "cli".into());
        config.custom_headers.insert("Authorization".into(), "Bearer t".into());
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.custom_headers[0].0, "Authorization");
        assert_eq!(client.custom_headers[1].0, "X-Client");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_ms: 2_000,
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&config).unwrap().with_retry_config(RetryConfig::none());
        let err = client.get("/ping", &[]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
