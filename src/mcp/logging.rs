//! MCP log levels and `notifications/message`.
//!
//! This is the protocol's client-facing log channel, independent of the
//! process's own `tracing` output. Every emitted message is mirrored to
//! `tracing` as well.

use serde_json::{json, Value};

use crate::mcp::protocol::OutgoingNotification;

/// RFC 5424 severities, lowest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// debug
    Debug,
    /// info
    Info,
    /// notice
    Notice,
    /// warning
    #[default]
    Warning,
    /// error
    Error,
    /// critical
    Critical,
    /// alert
    Alert,
    /// emergency
    Emergency,
}

impl LogLevel {
    /// Parses a level name. Unrecognised names fall back to `Info`.
    #[must_use]
    pub fn from_str_lenient(name: &str) -> Self {
        match name {
            "debug" => Self::Debug,
            "notice" => Self::Notice,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "critical" => Self::Critical,
            "alert" => Self::Alert,
            "emergency" => Self::Emergency,
            _ => Self::Info,
        }
    }

    /// Wire name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold filter for client log messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logging {
    level: LogLevel,
}

impl Logging {
    /// Current threshold.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Sets the threshold.
    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    /// Builds a `notifications/message` if `level` meets the threshold.
    #[must_use]
    pub fn message(&self, level: LogLevel, logger: &str, data: Value) -> Option<OutgoingNotification> {
        match level {
            LogLevel::Debug => tracing::debug!(logger, %data, "client log"),
            LogLevel::Info | LogLevel::Notice => tracing::info!(logger, %data, "client log"),
            LogLevel::Warning => tracing::warn!(logger, %data, "client log"),
            _ => tracing::error!(logger, severity = %level, %data, "client log"),
        }

        if level < self.level {
            return None;
        }

        Some(OutgoingNotification::new(
            "notifications/message",
            Some(json!({
                "level": level.as_str(),
                "logger": logger,
                "data": data,
            })),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_parsing() {
        assert_eq!(LogLevel::from_str_lenient("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_lenient("emergency"), LogLevel::Emergency);
        assert_eq!(LogLevel::from_str_lenient("verbose"), LogLevel::Info);
        assert_eq!(LogLevel::from_str_lenient("WARNING"), LogLevel::Info);
    }

    #[test]
    fn names_round_trip() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Notice,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
            LogLevel::Alert,
            LogLevel::Emergency,
        ] {
            assert_eq!(LogLevel::from_str_lenient(level.as_str()), level);
        }
    }

    #[test]
    fn default_threshold_is_warning() {
        let logging = Logging::default();
        assert_eq!(logging.level(), LogLevel::Warning);
        assert!(logging.message(LogLevel::Info, "sensor", json!("x")).is_none());
        assert!(logging.message(LogLevel::Warning, "sensor", json!("x")).is_some());
    }

    #[test]
    fn message_shape() {
        let mut logging = Logging::default();
        logging.set_level(LogLevel::Debug);
        let note = logging
            .message(LogLevel::Error, "can", json!({"bus": 1}))
            .unwrap();
        assert_eq!(note.method, "notifications/message");
        assert_eq!(
            note.params,
            Some(json!({"level": "error", "logger": "can", "data": {"bus": 1}}))
        );
    }
}
