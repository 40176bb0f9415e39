//! Platform detection and OS-specific utilities.

use std::path::PathBuf;
use crate::error::{ZephraError, ZephraResult};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Detect the current platform at compile time.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Get the platform-specific application data directory.
    ///
    /// - Windows: `%APPDATA%/Zephra`
    /// - macOS: `~/Library/Application Support/Zephra`
    /// - Linux: `~/.local/share/Zephra`
    pub fn data_dir() -> ZephraResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| ZephraError::Config("could not determine data directory".into()))?;
        Ok(base.join("Zephra"))
    }

    /// Get the platform-specific configuration directory.
    pub fn config_dir() -> ZephraResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| ZephraError::Config("could not determine config directory".into()))?;
        Ok(base.join("Zephra"))
    }

    /// Get the platform-specific cache directory.
    pub fn cache_dir() -> ZephraResult<PathBuf> {
        let base = dirs::cache_dir()
            .ok_or_else(|| ZephraError::Config("could not determine cache directory".into()))?;
        Ok(base.join("Zephra"))
    }

    /// Short identifier sent to the version-check endpoint.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }

    /// Get a human-readable platform name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
