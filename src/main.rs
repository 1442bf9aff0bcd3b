//! mcpd-stdio: runs the mcpd engine over stdin/stdout
//!
//! Reads newline-delimited JSON-RPC from stdin and writes replies,
//! notifications and server-initiated requests to stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use mcpd::config::{self, Config};
use mcpd::error::{ConfigError, ToolError};
use mcpd::mcp::args::ArgsExt;
use mcpd::mcp::server::McpServer;
use mcpd::mcp::tool::{Tool, ToolAnnotations};
use mcpd::mcp::transport::StdioTransport;
use mcpd::mcp::Resource;

/// MCP server engine for microcontrollers, hosted on stdio.
#[derive(Parser, Debug)]
#[command(name = "mcpd-stdio")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration. Without an explicit path a missing default
/// file falls back to built-in defaults.
fn load(path: Option<&std::path::Path>) -> Result<Config, ConfigError> {
    match config::load_config(path) {
        Err(ConfigError::NotFound { .. }) if path.is_none() => Ok(Config::default()),
        other => other,
    }
}

/// Registers the built-in diagnostic tools and resources.
fn register_builtins(server: &mut McpServer) {
    server.add_tool(
        Tool::new(
            "echo",
            "Returns the given message unchanged",
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            |args| {
                args.get_str("message")
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::invalid_argument("message", "expected a string"))
            },
        )
        .annotations(ToolAnnotations::default().read_only().idempotent().local_only()),
    );

    server.add_tool(
        Tool::new(
            "add",
            "Adds two numbers",
            json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
            |args| {
                let sum = args.f64_or("a", 0.0) + args.f64_or("b", 0.0);
                Ok(json!(sum).to_string())
            },
        )
        .annotations(ToolAnnotations::default().read_only().idempotent().local_only()),
    );

    server.add_resource(Resource::new(
        "device://info",
        "Device information",
        "Engine name and version",
        "application/json",
        || {
            Ok(json!({
                "engine": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            })
            .to_string())
        },
    ));
}

/// Entry point for the mcpd-stdio host.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting mcpd-stdio");
    if config_path.is_none() {
        if let Some(default_path) = config::default_config_path() {
            info!(path = %default_path.display(), "Using default configuration location");
        }
    }

    let mut server = McpServer::with_config(&cfg.server_config());
    register_builtins(&mut server);
    server.on_initialize(|client| info!(client, "Client connected"));

    info!(
        name = %server.info().name,
        roots = server.registry().roots().len(),
        "MCP server ready, waiting for client connection..."
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let mut transport = StdioTransport::stdio();
    let result = runtime.block_on(transport.run(&mut server));

    let pending = server.sampling().pending_count() + server.elicitation().pending_count();
    if pending > 0 {
        warn!(pending, "Shutting down with unanswered client requests");
    }

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "info"), Level::INFO);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
    }

    #[test]
    fn builtin_add_tool() {
        let mut server = McpServer::new("test");
        register_builtins(&mut server);
        let out = server.process_json_rpc(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"add","arguments":{"a":3,"b":7}}}"#,
        );
        assert!(out.contains("10"));
    }
}
