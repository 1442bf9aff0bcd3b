//! Error types for mcpd.
//!
//! Protocol-level failures are not represented here: they are JSON-RPC
//! error values (see [`crate::mcp::protocol::JsonRpcError`]) and never
//! escape the dispatcher as Rust errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// A failure reported by a tool, resource or completion callback.
///
/// The dispatcher converts these into `isError` tool results; they are
/// never propagated to the transport.
#[derive(Error, Debug)]
pub enum ToolError {
    /// An argument was missing or had an unusable value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The underlying peripheral or driver call failed.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    /// Creates an [`ToolError::InvalidArgument`] error.
    #[must_use]
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The configured maximum number of sessions is already in use.
    #[error("session limit reached ({max} active sessions)")]
    CapacityReached {
        /// The configured maximum.
        max: usize,
    },
}
