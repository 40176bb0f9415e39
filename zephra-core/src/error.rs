//! Global error types for the Zephra client.
//!
//! All error categories across the workspace are unified into a single
//! `ZephraError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using ZephraError.
pub type ZephraResult<T> = Result<T, ZephraError>;

/// Unified error type covering all error categories in Zephra.
#[derive(Error, Debug)]
pub enum ZephraError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Storage errors --
    /// SQLite database error.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Database integrity check failed.
    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    /// Key-value storage read or write failed.
    #[error("storage error: {0}")]
    Storage(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Server returned a non-success response.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The operation requires connectivity and the client is offline.
    #[error("offline: {0}")]
    Offline(String),

    // -- Platform errors --
    /// A platform capability (worker, notifications, push) is not available.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The user refused a permission prompt.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The caching worker rejected or failed a request.
    #[error("worker error: {0}")]
    Worker(String),

    /// Displaying a notification failed.
    #[error("notification error: {0}")]
    Notification(String),

    /// Push subscription management failed.
    #[error("push error: {0}")]
    Push(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Service errors --
    /// A service failed to initialize.
    #[error("service init error: {0}")]
    ServiceInit(String),

    /// A service is not yet initialized.
    #[error("service not initialized: {0}")]
    ServiceNotInitialized(String),

    /// A service operation failed.
    #[error("service error: {0}")]
    Service(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ZephraError {
    /// Whether the failure is transient and worth retrying later.
    ///
    /// Permission denials, missing capabilities and malformed payloads are
    /// terminal; connectivity problems and server-side failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::Offline(_) => true,
            Self::ServerError { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ZephraError {
    fn from(e: serde_json::Error) -> Self {
        ZephraError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for ZephraError {
    fn from(e: toml::de::Error) -> Self {
        ZephraError::Config(e.to_string())
    }
}
