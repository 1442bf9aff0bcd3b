//! mcpd: a Model Context Protocol server engine for small devices
//!
//! This library lets firmware-style code expose its capabilities to an AI
//! client over JSON-RPC 2.0, following MCP 2025-03-26.
//!
//! # Architecture
//!
//! The engine is a single-threaded state machine. A host transport feeds it
//! one payload at a time; every request is parsed, dispatched, handled and
//! serialised before the call returns. Handlers are plain callbacks:
//!
//! - **Tools**: named operations with a JSON Schema, returning text or rich
//!   content
//! - **Resources**: static URIs and `{variable}` templates producing content
//! - **Prompts**: named message templates with required/optional arguments
//! - **Roots**: URI/name pairs describing the device's storage
//!
//! Server-initiated sampling and elicitation requests, subscriptions, log
//! messages and progress updates are queued and drained by the host.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types
//! - [`mcp`] - MCP protocol implementation

pub mod config;
pub mod error;
pub mod mcp;
