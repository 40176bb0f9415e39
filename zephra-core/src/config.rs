//! Application configuration management.
//!
//! Handles loading, saving, and accessing application configuration including
//! the API endpoint, sync queue policy, caching worker, push keys and update
//! checks. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{ZephraError, ZephraResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Local persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Background sync queue policy.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Caching worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Push notification settings.
    #[serde(default)]
    pub push: PushConfig,

    /// App update settings.
    #[serde(default)]
    pub updates: UpdateConfig,

    /// Air-quality alert settings.
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Zephra API base URL (e.g., "https://zephra-api.onrender.com").
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Custom HTTP headers as key-value pairs.
    #[serde(default)]
    pub custom_headers: std::collections::HashMap<String, String>,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub timeout_ms: u64,
}

/// Local persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite store. If empty, uses default location.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Run integrity check on startup.
    #[serde(default = "default_true")]
    pub integrity_check_on_startup: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

/// Background sync queue policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base retry delay in milliseconds (doubled per failure).
    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_ms: u64,

    /// Retry delay cap in milliseconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Fallback drain interval in seconds.
    #[serde(default = "default_fallback_interval")]
    pub fallback_interval_secs: u64,

    /// Retry cap used when an item is queued without one.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

/// Caching worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker script URL.
    #[serde(default = "default_script_url")]
    pub script_url: String,

    /// Registration scope.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Update poll interval in seconds.
    #[serde(default = "default_update_poll")]
    pub update_poll_secs: u64,

    /// Directory backing the local worker's caches. If empty, uses default location.
    #[serde(default)]
    pub cache_dir: String,
}

/// Push notification configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    /// VAPID public key (base64url) used to authorize subscriptions.
    #[serde(default)]
    pub vapid_public_key: String,
}

/// App update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Version assumed when no version record has been persisted yet.
    #[serde(default = "default_current_version")]
    pub current_version: String,

    /// Build number reported to the version-check endpoint.
    #[serde(default)]
    pub build_number: String,

    /// Version check interval in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Fallback timeout for the controller-change wait, in milliseconds.
    #[serde(default = "default_controller_timeout")]
    pub controller_change_timeout_ms: u64,

    /// Maximum version history entries.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

/// Air-quality alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// AQI above which a notification is shown.
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: f64,

    /// Geolocation lookup timeout in seconds.
    #[serde(default = "default_geolocation_timeout")]
    pub geolocation_timeout_secs: u64,
}

// Default value functions for serde

fn default_api_base_url() -> String {
    constants::DEFAULT_API_BASE_URL.to_string()
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_retry_delay() -> u64 {
    constants::sync::BASE_RETRY_DELAY_MS
}

fn default_max_retry_delay() -> u64 {
    constants::sync::MAX_RETRY_DELAY_MS
}

fn default_fallback_interval() -> u64 {
    constants::sync::FALLBACK_INTERVAL_SECS
}

fn default_max_retries() -> u32 {
    constants::sync::DEFAULT_MAX_RETRIES
}

fn default_script_url() -> String {
    constants::worker::SCRIPT_URL.to_string()
}

fn default_scope() -> String {
    constants::worker::SCOPE.to_string()
}

fn default_update_poll() -> u64 {
    constants::worker::UPDATE_POLL_SECS
}

fn default_current_version() -> String {
    constants::APP_VERSION.to_string()
}

fn default_check_interval() -> u64 {
    constants::updates::CHECK_INTERVAL_SECS
}

fn default_controller_timeout() -> u64 {
    constants::updates::CONTROLLER_CHANGE_TIMEOUT_MS
}

fn default_max_history() -> usize {
    constants::updates::MAX_VERSION_HISTORY
}

fn default_notify_threshold() -> f64 {
    constants::AQI_NOTIFY_THRESHOLD
}

fn default_geolocation_timeout() -> u64 {
    constants::GEOLOCATION_TIMEOUT_SECS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            custom_headers: std::collections::HashMap::new(),
            timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
            integrity_check_on_startup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_retry_delay_ms: default_base_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
            fallback_interval_secs: default_fallback_interval(),
            default_max_retries: default_max_retries(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            script_url: default_script_url(),
            scope: default_scope(),
            update_poll_secs: default_update_poll(),
            cache_dir: String::new(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            current_version: default_current_version(),
            build_number: String::new(),
            check_interval_secs: default_check_interval(),
            controller_change_timeout_ms: default_controller_timeout(),
            max_history: default_max_history(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            notify_threshold: default_notify_threshold(),
            geolocation_timeout_secs: default_geolocation_timeout(),
        }
    }
}

impl SyncConfig {
    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> ZephraResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> ZephraResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> ZephraResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> ZephraResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ZephraError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> ZephraResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective store path, using the configured path or the default.
    pub fn effective_store_path(&self) -> ZephraResult<PathBuf> {
        if self.storage.path.is_empty() {
            Ok(Platform::data_dir()?.join("zephra.db"))
        } else {
            Ok(PathBuf::from(&self.storage.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> ZephraResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Get the effective worker cache directory.
    pub fn effective_cache_dir(&self) -> ZephraResult<PathBuf> {
        if self.worker.cache_dir.is_empty() {
            Ok(Platform::cache_dir()?.join("worker"))
        } else {
            Ok(PathBuf::from(&self.worker.cache_dir))
        }
    }

    /// Whether push subscriptions can be created (a VAPID key is configured).
    pub fn is_push_configured(&self) -> bool {
        !self.push.vapid_public_key.trim().is_empty()
    }

    /// Normalize an API base URL: add a scheme when missing, strip trailing slashes.
    pub fn sanitize_base_url(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
            format!("http://{trimmed}")
        } else {
            format!("https://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone the current configuration out of the lock.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> ZephraResult<()> {
        let config = self.inner.read().await;
        config.save_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.sync.base_retry_delay_ms, 1_000);
        assert_eq!(config.sync.max_retry_delay_ms, 300_000);
        assert_eq!(config.sync.fallback_interval(), Duration::from_secs(30));
        assert_eq!(config.worker.scope, "/");
        assert_eq!(config.updates.max_history, 10);
        assert_eq!(config.alerts.notify_threshold, 100.0);
        assert!(!config.is_push_configured());
    }

    #[test]
    fn test_sanitize_base_url() {
        assert_eq!(
            AppConfig::sanitize_base_url("zephra-api.onrender.com/"),
            "https://zephra-api.onrender.com"
        );
        assert_eq!(
            AppConfig::sanitize_base_url("localhost:10000"),
            "http://localhost:10000"
        );
        assert_eq!(
            AppConfig::sanitize_base_url("  \"http://192.168.1.5:8000/\"  "),
            "http://192.168.1.5:8000"
        );
        assert_eq!(AppConfig::sanitize_base_url("   "), "");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.com"

            [sync]
            default_max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.sync.default_max_retries, 5);
        assert_eq!(config.sync.max_retry_delay_ms, 300_000);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.push.vapid_public_key = "BEl62iUYgUivxIkv69yViEuiBIa".into();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert!(loaded.is_push_configured());
        assert_eq!(loaded.worker.script_url, "/sw.js");
    }

    #[tokio::test]
    async fn test_config_handle_write() {
        let handle = ConfigHandle::new(AppConfig::default());
        handle.write().await.alerts.notify_threshold = 150.0;
        assert_eq!(handle.snapshot().await.alerts.notify_threshold, 150.0);
    }
}
