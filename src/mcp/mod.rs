//! Model Context Protocol (MCP) server core.
//!
//! The server speaks JSON-RPC 2.0 and exposes device capabilities (tools,
//! resources, prompts, roots) to an AI client. It is transport-agnostic:
//! a host hands it raw text and drains the queued output afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          McpServer                            │
//! │                                                               │
//! │   ┌───────────┐    ┌───────────┐    ┌──────────────────────┐  │
//! │   │ protocol  │───▶│  router   │───▶│ registry (tools,     │  │
//! │   │ (codec)   │    │ (server)  │    │ resources, prompts)  │  │
//! │   └───────────┘    └───────────┘    └──────────────────────┘  │
//! │         │               │                                     │
//! │         │               ▼                                     │
//! │         │   ┌───────────────────────────────────────────────┐ │
//! │         │   │ notify · tracker · sampling · elicitation     │ │
//! │         │   │ rate_limit · session · completion             │ │
//! │         │   │ groups · cache                                │ │
//! │         │   └───────────────────────────────────────────────┘ │
//! │         ▼                                                     │
//! │   ┌─────────────────────────────────────────────────────────┐ │
//! │   │            transport (newline-delimited host)           │ │
//! │   └─────────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2025-03-26.

pub mod args;
pub mod cache;
pub mod completion;
pub mod content;
pub mod elicitation;
pub mod groups;
pub mod icon;
pub mod logging;
pub mod notify;
pub mod outbound;
pub mod pagination;
pub mod prompt;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod resource;
pub mod sampling;
pub mod server;
pub mod session;
pub mod tool;
pub mod tracker;
pub mod transport;

pub use args::ArgsExt;
pub use cache::ToolResultCache;
pub use content::{ToolCallResult, ToolContent};
pub use groups::{ToolGroup, ToolGroups};
pub use logging::LogLevel;
pub use prompt::{Prompt, PromptArgument, PromptMessage};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use resource::{Resource, ResourceTemplate};
pub use server::{McpServer, ServerConfig};
pub use tool::{Tool, ToolAnnotations, ToolContext};
pub use transport::{LineTransport, StdioTransport};
