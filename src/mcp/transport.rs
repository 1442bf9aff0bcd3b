//! Newline-delimited JSON-RPC host loop.
//!
//! The server core does no I/O. This module is the thin host used by the
//! `mcpd-stdio` binary:
//!
//! - Messages are UTF-8 encoded JSON-RPC, one per line
//! - Messages must not contain embedded newlines
//! - After each inbound line the reply (if any) is written, followed by
//!   queued notifications and then queued sampling/elicitation requests
//! - stderr may be used for logging (not MCP messages)
//!
//! The reader and writer are generic so the loop can be driven by mock I/O
//! in tests.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::server::McpServer;

/// A line-framed transport over any async reader and writer.
#[derive(Debug)]
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// The transport over the process's stdin and stdout.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps a reader and writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message line.
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        // Remove the trailing newline
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes one message with newline termination and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Feeds one inbound line to the server and writes everything it
    /// produced.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn handle_line(&mut self, server: &mut McpServer, line: &str) -> io::Result<()> {
        let reply = server.process_json_rpc(line);
        if !reply.is_empty() {
            self.write_raw(&reply).await?;
        }
        self.flush_queued(server).await
    }

    /// Writes queued notifications, then queued outbound requests.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn flush_queued(&mut self, server: &mut McpServer) -> io::Result<()> {
        for notification in server.drain_notifications() {
            self.write_raw(&notification).await?;
        }
        for request in server.drain_outgoing() {
            self.write_raw(&request).await?;
        }
        Ok(())
    }

    /// Serves until end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve(&mut self, server: &mut McpServer) -> io::Result<()> {
        loop {
            let line_result = self.read_line().await;
            if self.handle_transport_result(server, line_result).await? {
                return Ok(());
            }
        }
    }

    /// Handles the result from a read.
    ///
    /// Returns `true` if the loop should stop.
    async fn handle_transport_result(
        &mut self,
        server: &mut McpServer,
        line_result: io::Result<Option<String>>,
    ) -> io::Result<bool> {
        let Some(line) = line_result? else {
            tracing::info!("Input closed");
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(server, &line).await?;
        Ok(false)
    }

    /// Serves until end of input or a shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(unix)]
    pub async fn run(&mut self, server: &mut McpServer) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    return Ok(());
                }

                line_result = self.read_line() => {
                    if self.handle_transport_result(server, line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Serves until end of input or a shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(windows)]
    pub async fn run(&mut self, server: &mut McpServer) -> io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    return Ok(());
                }

                line_result = self.read_line() => {
                    if self.handle_transport_result(server, line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::elicitation::ElicitationRequest;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn ping_round_trip() {
        let reader = Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .build();
        let writer = Builder::new()
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n")
            .build();

        let mut server = McpServer::new("test");
        let mut transport = LineTransport::new(BufReader::new(reader), writer);
        transport.serve(&mut server).await.unwrap();
    }

    #[tokio::test]
    async fn notifications_and_blank_lines_write_nothing() {
        let reader = Builder::new()
            .read(b"\r\n   \n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\r\n")
            .build();
        let writer = Builder::new().build();

        let mut server = McpServer::new("test");
        let mut transport = LineTransport::new(BufReader::new(reader), writer);
        transport.serve(&mut server).await.unwrap();
    }

    #[tokio::test]
    async fn parse_error_is_written() {
        let reader = Builder::new().read(b"{not json\n").build();
        let writer = Builder::new()
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32700,\"message\":\"Parse error\"}}\n")
            .build();

        let mut server = McpServer::new("test");
        let mut transport = LineTransport::new(BufReader::new(reader), writer);
        transport.serve(&mut server).await.unwrap();
    }

    #[tokio::test]
    async fn queued_messages_follow_the_reply() {
        let reader = Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"ping\"}\n")
            .build();
        let writer = Builder::new()
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"result\":{}}\n")
            .write(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/tools/list_changed\"}\n")
            .write(b"{\"id\":8000,\"jsonrpc\":\"2.0\",\"method\":\"elicitation/create\",\"params\":{\"message\":\"Name?\",\"requestedSchema\":{\"properties\":{},\"required\":[],\"type\":\"object\"}}}\n")
            .build();

        let mut server = McpServer::new("test");
        server.notify_tools_changed();
        server.request_elicitation(&ElicitationRequest::new("Name?"), |_| {});
        let mut transport = LineTransport::new(BufReader::new(reader), writer);
        transport.serve(&mut server).await.unwrap();
        assert_eq!(server.pending_notification_count(), 0);
        assert!(server.elicitation().has_pending());
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let reader = Builder::new().read(b"abc\r\nxyz").build();
        let mut transport = LineTransport::new(BufReader::new(reader), Builder::new().build());
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("xyz"));
        assert_eq!(transport.read_line().await.unwrap(), None);
    }
}
