//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given as the CLI argument
//! 2. Default location:
//!    - **Linux/macOS:** `~/.mcpd/config.json`
//!    - **Windows:** `%USERPROFILE%\.mcpd\config.json`
//!
//! A missing file is not fatal for the binary: it falls back to
//! [`Config::default`].
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "server": { "name": "sensor", "description": "Bench thermal sensor" },
//!   "page_size": 20,
//!   "rate_limit": { "requests_per_second": 10.0, "burst_capacity": 20 },
//!   "sessions": { "max_sessions": 4, "idle_timeout_secs": 1800 },
//!   "roots": [{ "uri": "file:///sd", "name": "SD card" }],
//!   "logging": { "level": "warn" }
//! }
//! ```

mod settings;

pub use settings::{Config, LoggingConfig, RateLimitConfig, RootConfig, ServerSection, SessionConfig};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.mcpd/`
/// - **Windows:** `%USERPROFILE%\.mcpd\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".mcpd"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, uses the platform-specific default location.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required fields are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path().ok_or_else(|| ConfigError::NotFound {
            path: PathBuf::from("<default config path>"),
        })?,
    };

    if !config_path.exists() {
        return Err(ConfigError::NotFound { path: config_path });
    }

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}
