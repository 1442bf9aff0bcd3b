//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::mcp::protocol::SERVER_NAME;
use crate::mcp::server::ServerConfig;
use crate::mcp::session::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS};

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Server identity.
    #[serde(default)]
    pub server: ServerSection,

    /// Entries per list page; 0 disables pagination.
    #[serde(default)]
    pub page_size: usize,

    /// Request rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Session limits.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Roots exposed through `roots/list`.
    #[serde(default)]
    pub roots: Vec<RootConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.name must not be empty".to_string(),
            });
        }

        let rate = &self.rate_limit;
        if rate.burst_capacity > 0 && rate.requests_per_second <= 0.0 {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "rate_limit.requests_per_second must be positive when burst_capacity is set (got {})",
                    rate.requests_per_second
                ),
            });
        }

        if let Some(index) = self.roots.iter().position(|r| r.uri.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: format!("roots[{index}].uri must not be empty"),
            });
        }

        Ok(())
    }

    /// Converts the file settings into server settings.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new()
            .name(self.server.name.as_str())
            .page_size(self.page_size)
            .max_sessions(self.sessions.max_sessions)
            .idle_timeout(Duration::from_secs(self.sessions.idle_timeout_secs));

        if let Some(description) = &self.server.description {
            config = config.description(description.as_str());
        }
        if self.rate_limit.is_enabled() {
            config = config.rate_limit(
                self.rate_limit.requests_per_second,
                self.rate_limit.burst_capacity,
            );
        }
        for root in &self.roots {
            config = config.root(root.uri.as_str(), root.display_name());
        }
        config
    }
}

/// Server identity reported to clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Name in `serverInfo`.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Description in `serverInfo`.
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            description: None,
        }
    }
}

fn default_server_name() -> String {
    SERVER_NAME.to_string()
}

/// Token-bucket settings. A burst capacity of 0 leaves limiting off.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Refill rate.
    #[serde(default)]
    pub requests_per_second: f64,

    /// Bucket size.
    #[serde(default)]
    pub burst_capacity: usize,
}

impl RateLimitConfig {
    /// Returns `true` if these settings turn limiting on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.burst_capacity > 0 && self.requests_per_second > 0.0
    }
}

/// Session limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Maximum concurrent sessions; 0 means unlimited.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle expiry in seconds; 0 means never.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

const fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

const fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

/// A root entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    /// Root URI, e.g. `file:///sd`.
    pub uri: String,

    /// Display name; defaults to the URI.
    #[serde(default)]
    pub name: Option<String>,
}

impl RootConfig {
    /// The name, or the URI when none was given.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uri)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
