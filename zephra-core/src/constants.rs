//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Zephra";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with API requests and version checks.
pub const USER_AGENT: &str = concat!("zephra/", env!("CARGO_PKG_VERSION"));

/// Default API base URL (the FastAPI backend's default port).
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:10000";

/// Default server API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Keys under which client state is persisted in the key-value store.
pub mod storage_keys {
    /// Pending background sync queue (JSON array, priority sorted).
    pub const SYNC_QUEUE: &str = "zephra-sync-queue";
    /// Currently installed application version record.
    pub const APP_VERSION: &str = "zephra-app-version";
    /// Bounded list of previously installed versions.
    pub const VERSION_HISTORY: &str = "zephra-version-history";
    /// Per-location AQI alert settings.
    pub const ALERT_SETTINGS: &str = "zephra-alert-settings";
    /// User health profile used to tailor alerts.
    pub const HEALTH_PROFILE: &str = "zephra-health-profile";
}

/// Sync queue timing.
pub mod sync {
    /// Base retry delay; doubled on every failed attempt.
    pub const BASE_RETRY_DELAY_MS: u64 = 1_000;
    /// Upper bound on the retry delay (5 minutes).
    pub const MAX_RETRY_DELAY_MS: u64 = 300_000;
    /// Fallback drain interval, independent of online/offline events.
    pub const FALLBACK_INTERVAL_SECS: u64 = 30;
    /// Attempts before an item is dropped when the caller gives none.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Expiry applied to air-quality requests queued while offline.
    pub const AIR_QUALITY_EXPIRY_MS: i64 = 30 * 60 * 1_000;
    /// Expiry applied to queued location updates.
    pub const LOCATION_EXPIRY_MS: i64 = 60 * 60 * 1_000;
    /// Expiry applied to queued analytics events.
    pub const ANALYTICS_EXPIRY_MS: i64 = 24 * 60 * 60 * 1_000;
}

/// Caching worker defaults.
pub mod worker {
    pub const SCRIPT_URL: &str = "/sw.js";
    pub const SCOPE: &str = "/";
    /// Update poll interval while the page is visible.
    pub const UPDATE_POLL_SECS: u64 = 30;
    /// Caches declared by the manifest's runtime caching rules.
    pub const KNOWN_CACHES: &[&str] = &["zephra-api", "zephra-images", "zephra-fonts", "zephra-static"];
}

/// App update defaults.
pub mod updates {
    /// Version check interval (30 minutes).
    pub const CHECK_INTERVAL_SECS: u64 = 30 * 60;
    /// Fallback when the controller-change event never arrives.
    pub const CONTROLLER_CHANGE_TIMEOUT_MS: u64 = 5_000;
    /// Maximum entries kept in the version history.
    pub const MAX_VERSION_HISTORY: usize = 10;
}

/// AQI value above which a push notification is raised.
pub const AQI_NOTIFY_THRESHOLD: f64 = 100.0;

/// Timeout bounding a geolocation lookup.
pub const GEOLOCATION_TIMEOUT_SECS: u64 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_bounds() {
        assert!(sync::BASE_RETRY_DELAY_MS < sync::MAX_RETRY_DELAY_MS);
        assert_eq!(sync::MAX_RETRY_DELAY_MS, 5 * 60 * 1_000);
    }

    #[test]
    fn test_user_agent_contains_version() {
        assert!(USER_AGENT.ends_with(APP_VERSION));
    }
}
