//! CLI command implementations.

pub mod status;
pub mod dashboard;
pub mod queue;
pub mod cache;
pub mod update;
pub mod alert;

use std::sync::Arc;

use tracing::debug;

use zephra_api::ApiClient;
use zephra_core::config::ConfigHandle;
use zephra_core::error::ZephraResult;
use zephra_models::{Database, SqliteStore};
use zephra_services::{ServiceDeps, ServiceManager};

/// Helper to open the local store from config.
pub async fn init_store(config: &ConfigHandle) -> ZephraResult<SqliteStore> {
    let cfg = config.read().await;
    let db_path = cfg.effective_store_path()?;
    let db = Database::init(&db_path, &cfg.storage)?;
    Ok(SqliteStore::new(db))
}

/// Helper to create an API client from config.
pub async fn create_api_client(config: &ConfigHandle) -> ZephraResult<ApiClient> {
    let api_config = config.read().await.api.clone();
    ApiClient::new(&api_config)
}

/// Build and initialize the service manager.
///
/// Connectivity is seeded from a ping so queued work is only drained when
/// the API is actually reachable.
pub async fn start_manager(config: &ConfigHandle) -> ZephraResult<ServiceManager> {
    let store = init_store(config).await?;
    let api = create_api_client(config).await?;
    let online = api.ping().await.is_ok();
    debug!("api reachable: {online}");

    let deps = {
        let cfg = config.read().await;
        ServiceDeps::desktop(&cfg, Arc::new(store), api)?
    };
    deps.network.set_online(online);

    let manager = ServiceManager::new(config.clone(), deps).await;
    let report = manager.initialize().await;
    for (name, reason) in report.failures() {
        debug!("{name} failed to start: {reason}");
    }
    Ok(manager)
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format an epoch-millisecond timestamp in UTC.
pub fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to a maximum number of characters, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
