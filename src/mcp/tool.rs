//! Tool definitions and invocation.
//!
//! A tool is a named handler with a JSON Schema for its arguments. Handlers
//! run synchronously on the caller's stack: a handler that blocks (for
//! example waiting on a slow bus transaction) blocks the whole server, so
//! keep them bounded in time.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bitflags::bitflags;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ToolError;
use crate::mcp::content::ToolCallResult;
use crate::mcp::icon::Icon;
use crate::mcp::protocol::{OutgoingNotification, RequestId};

/// Handler returning plain text, wrapped as a single text content item.
pub type TextToolHandler = Box<dyn Fn(&Value) -> Result<String, ToolError>>;

/// Handler returning structured, possibly multi-part content.
pub type RichToolHandler = Box<dyn Fn(&Value) -> Result<ToolCallResult, ToolError>>;

/// Structured handler that also receives the call context.
pub type ContextToolHandler =
    Box<dyn Fn(&Value, &mut ToolContext) -> Result<ToolCallResult, ToolError>>;

/// The handler shapes a tool can register.
pub enum ToolHandler {
    /// Plain string output.
    Text(TextToolHandler),
    /// Structured output.
    Rich(RichToolHandler),
    /// Structured output with access to the call context.
    Context(ContextToolHandler),
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(_) => f.write_str("ToolHandler::Text"),
            Self::Rich(_) => f.write_str("ToolHandler::Rich"),
            Self::Context(_) => f.write_str("ToolHandler::Context"),
        }
    }
}

/// Per-call state handed to context handlers.
///
/// Progress reported here is queued as `notifications/progress` once the
/// handler returns. Without a progress token from the client, reports are
/// dropped.
#[derive(Debug, Clone)]
pub struct ToolContext {
    request_id: RequestId,
    progress_token: Option<String>,
    progress: Vec<OutgoingNotification>,
}

impl ToolContext {
    /// Creates the context for one `tools/call`.
    #[must_use]
    pub const fn new(request_id: RequestId, progress_token: Option<String>) -> Self {
        Self {
            request_id,
            progress_token,
            progress: Vec::new(),
        }
    }

    /// ID of the `tools/call` request being served.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The client's `_meta.progressToken`, if it sent one.
    #[must_use]
    pub fn progress_token(&self) -> Option<&str> {
        self.progress_token.as_deref()
    }

    /// Records a progress update. A `total` of zero omits it. Returns
    /// `false` when the client asked for no progress.
    pub fn report_progress(&mut self, progress: f64, total: f64, message: &str) -> bool {
        let Some(token) = &self.progress_token else {
            return false;
        };
        self.progress
            .push(OutgoingNotification::progress(token, progress, total, message));
        true
    }

    /// Takes the recorded progress notifications, oldest first.
    pub fn take_progress(&mut self) -> Vec<OutgoingNotification> {
        std::mem::take(&mut self.progress)
    }
}

bitflags! {
    /// Behaviour hints advertised to clients.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ToolHints: u8 {
        /// The tool does not modify its environment.
        const READ_ONLY = 1 << 0;
        /// The tool may perform destructive updates.
        const DESTRUCTIVE = 1 << 1;
        /// Repeated calls with the same arguments have no additional effect.
        const IDEMPOTENT = 1 << 2;
        /// The tool interacts with entities outside the device.
        const OPEN_WORLD = 1 << 3;
    }
}

/// Tool annotations (`readOnlyHint`, `destructiveHint`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAnnotations {
    /// Human-readable title.
    pub title: Option<String>,
    /// Hint flags.
    pub hints: ToolHints,
}

impl Default for ToolAnnotations {
    /// MCP defaults: destructive and open-world until stated otherwise.
    fn default() -> Self {
        Self {
            title: None,
            hints: ToolHints::DESTRUCTIVE | ToolHints::OPEN_WORLD,
        }
    }
}

impl ToolAnnotations {
    /// Marks the tool read-only, which also clears the destructive hint.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.hints.insert(ToolHints::READ_ONLY);
        self.hints.remove(ToolHints::DESTRUCTIVE);
        self
    }

    /// Sets the destructive hint.
    #[must_use]
    pub fn destructive(mut self, destructive: bool) -> Self {
        self.hints.set(ToolHints::DESTRUCTIVE, destructive);
        self
    }

    /// Marks the tool idempotent.
    #[must_use]
    pub fn idempotent(mut self) -> Self {
        self.hints.insert(ToolHints::IDEMPOTENT);
        self
    }

    /// Marks the tool as touching only local hardware.
    #[must_use]
    pub fn local_only(mut self) -> Self {
        self.hints.remove(ToolHints::OPEN_WORLD);
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Serialize for ToolAnnotations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.title.is_some() { 5 } else { 4 };
        let mut s = serializer.serialize_struct("ToolAnnotations", len)?;
        if let Some(title) = &self.title {
            s.serialize_field("title", title)?;
        }
        s.serialize_field("readOnlyHint", &self.hints.contains(ToolHints::READ_ONLY))?;
        s.serialize_field("destructiveHint", &self.hints.contains(ToolHints::DESTRUCTIVE))?;
        s.serialize_field("idempotentHint", &self.hints.contains(ToolHints::IDEMPOTENT))?;
        s.serialize_field("openWorldHint", &self.hints.contains(ToolHints::OPEN_WORLD))?;
        s.end()
    }
}

/// A registered tool.
#[derive(Debug)]
pub struct Tool {
    /// Unique tool name.
    pub name: String,
    /// Display title.
    pub title: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
    /// JSON Schema for structured output.
    pub output_schema: Option<Value>,
    /// Behaviour hints.
    pub annotations: Option<ToolAnnotations>,
    /// UI icons.
    pub icons: Vec<Icon>,
    handler: ToolHandler,
}

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition<'a> {
    /// Unique tool name.
    pub name: &'a str,
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    /// Human-readable description.
    pub description: &'a str,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: &'a Value,
    /// JSON Schema for structured output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<&'a Value>,
    /// Behaviour hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<&'a ToolAnnotations>,
    /// UI icons.
    #[serde(skip_serializing_if = "<[Icon]>::is_empty")]
    pub icons: &'a [Icon],
}

impl Tool {
    /// Creates a tool whose handler returns plain text.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Value) -> Result<String, ToolError> + 'static,
    {
        Self::with_handler(name, description, input_schema, ToolHandler::Text(Box::new(handler)))
    }

    /// Creates a tool whose handler returns structured content.
    pub fn rich<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Value) -> Result<ToolCallResult, ToolError> + 'static,
    {
        Self::with_handler(name, description, input_schema, ToolHandler::Rich(Box::new(handler)))
    }

    /// Creates a tool whose handler returns structured content and receives
    /// the call context.
    pub fn with_context<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Value, &mut ToolContext) -> Result<ToolCallResult, ToolError> + 'static,
    {
        Self::with_handler(name, description, input_schema, ToolHandler::Context(Box::new(handler)))
    }

    fn with_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            input_schema,
            output_schema: None,
            annotations: None,
            icons: Vec::new(),
            handler,
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Declares an output schema, enabling `structuredContent`.
    #[must_use]
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the annotations.
    #[must_use]
    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Adds an icon.
    #[must_use]
    pub fn icon(mut self, icon: Icon) -> Self {
        self.icons.push(icon);
        self
    }

    /// Returns `true` if this tool uses a structured handler path.
    #[must_use]
    pub const fn is_rich(&self) -> bool {
        matches!(self.handler, ToolHandler::Rich(_) | ToolHandler::Context(_))
    }

    /// Returns the tools/list entry for this tool.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition<'_> {
        ToolDefinition {
            name: &self.name,
            title: self.title.as_deref(),
            description: &self.description,
            input_schema: &self.input_schema,
            output_schema: self.output_schema.as_ref(),
            annotations: self.annotations.as_ref(),
            icons: &self.icons,
        }
    }

    /// Invokes the handler with an arguments object.
    ///
    /// Handler errors and panics are converted into an error result; they
    /// never propagate to the caller.
    #[must_use]
    pub fn call(&self, arguments: &Value) -> ToolCallResult {
        self.call_in(arguments, &mut ToolContext::new(RequestId::Null, None))
    }

    /// Invokes the handler within a call context.
    pub fn call_in(&self, arguments: &Value, context: &mut ToolContext) -> ToolCallResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| match &self.handler {
            ToolHandler::Text(handler) => handler(arguments).map(|text| self.wrap_text(text)),
            ToolHandler::Rich(handler) => handler(arguments),
            ToolHandler::Context(handler) => handler(arguments, context),
        }));

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(tool = %self.name, error = %e, "Tool handler failed");
                ToolCallResult::error(format!("Internal tool error: {e}"))
            }
            Err(_) => {
                tracing::error!(tool = %self.name, "Tool handler panicked");
                ToolCallResult::error("Internal tool error")
            }
        }
    }

    /// Wraps plain handler output, adding `structuredContent` when the tool
    /// declares an output schema and the text is a JSON object or array.
    fn wrap_text(&self, text: String) -> ToolCallResult {
        let structured = self
            .output_schema
            .as_ref()
            .and_then(|_| serde_json::from_str::<Value>(&text).ok())
            .filter(|v| v.is_object() || v.is_array());

        let mut result = ToolCallResult::text(text);
        result.structured_content = structured;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::content::ToolContent;
    use serde_json::json;

    fn echo() -> Tool {
        Tool::new("echo", "Echo", json!({"type": "object"}), |args| {
            Ok(args.to_string())
        })
    }

    #[test]
    fn definition_serialisation() {
        let tool = echo();
        let json = serde_json::to_value(tool.definition()).unwrap();
        assert_eq!(
            json,
            json!({"name": "echo", "description": "Echo", "inputSchema": {"type": "object"}})
        );
    }

    #[test]
    fn definition_with_metadata() {
        let tool = echo()
            .title("Echo Tool")
            .output_schema(json!({"type": "object"}))
            .icon(Icon::new("https://x/icon.png"))
            .annotations(ToolAnnotations::default().read_only());
        let json = serde_json::to_value(tool.definition()).unwrap();
        assert_eq!(json["title"], json!("Echo Tool"));
        assert_eq!(json["outputSchema"], json!({"type": "object"}));
        assert_eq!(json["icons"][0]["src"], json!("https://x/icon.png"));
        assert_eq!(json["annotations"]["readOnlyHint"], json!(true));
        assert_eq!(json["annotations"]["destructiveHint"], json!(false));
    }

    #[test]
    fn annotation_defaults_follow_protocol() {
        let json = serde_json::to_value(ToolAnnotations::default()).unwrap();
        assert_eq!(
            json,
            json!({
                "readOnlyHint": false,
                "destructiveHint": true,
                "idempotentHint": false,
                "openWorldHint": true
            })
        );
    }

    #[test]
    fn annotation_builder_chain() {
        let ann = ToolAnnotations::default()
            .title("Relay")
            .idempotent()
            .local_only()
            .destructive(false);
        assert!(ann.hints.contains(ToolHints::IDEMPOTENT));
        assert!(!ann.hints.contains(ToolHints::OPEN_WORLD));
        assert!(!ann.hints.contains(ToolHints::DESTRUCTIVE));
        assert_eq!(ann.title.as_deref(), Some("Relay"));
    }

    #[test]
    fn text_handler_wraps_output() {
        let result = echo().call(&json!({"a": 1}));
        assert_eq!(result.content, vec![ToolContent::text(r#"{"a":1}"#)]);
        assert!(result.structured_content.is_none());
    }

    #[test]
    fn structured_content_requires_schema_and_json() {
        let tool = echo().output_schema(json!({"type": "object"}));
        let result = tool.call(&json!({"v": 42}));
        assert_eq!(result.structured_content, Some(json!({"v": 42})));

        let plain = Tool::new("t", "t", json!({}), |_| Ok("hello".into()))
            .output_schema(json!({"type": "string"}));
        assert!(plain.call(&json!({})).structured_content.is_none());
    }

    #[test]
    fn handler_error_becomes_error_result() {
        let tool = Tool::new("fail", "Fails", json!({}), |_| {
            Err(ToolError::Hardware("I2C NACK".into()))
        })
        .output_schema(json!({"type": "object"}));
        let result = tool.call(&json!({}));
        assert!(result.is_error);
        assert!(result.structured_content.is_none());
        let ToolContent::Text { text } = &result.content[0] else {
            panic!("expected text");
        };
        assert!(text.starts_with("Internal tool error"));
        assert!(text.contains("I2C NACK"));
    }

    #[test]
    fn handler_panic_becomes_error_result() {
        let tool = Tool::new("boom", "Panics", json!({}), |_| panic!("sensor exploded"));
        let result = tool.call(&json!({}));
        assert!(result.is_error);
        assert_eq!(result.content, vec![ToolContent::text("Internal tool error")]);
    }

    #[test]
    fn rich_handler_passes_through() {
        let tool = Tool::rich("cam", "Camera", json!({}), |_| {
            Ok(ToolCallResult::image("AAAA", "image/jpeg", "frame"))
        });
        assert!(tool.is_rich());
        let result = tool.call(&json!({}));
        assert_eq!(result.content.len(), 2);
        assert!(!result.is_error);
    }

    fn stepper() -> Tool {
        Tool::with_context("sweep", "Sweeps a servo", json!({}), |args, ctx| {
            let steps = args.get("steps").and_then(Value::as_u64).unwrap_or(2);
            for step in 1..=steps {
                #[allow(clippy::cast_precision_loss)]
                ctx.report_progress(step as f64, steps as f64, "");
            }
            Ok(ToolCallResult::text(format!("request {}", ctx.request_id())))
        })
    }

    #[test]
    fn context_handler_reports_progress() {
        let tool = stepper();
        assert!(tool.is_rich());
        let mut ctx = ToolContext::new(RequestId::from(7), Some("sweep-1".into()));
        let result = tool.call_in(&json!({"steps": 3}), &mut ctx);
        assert_eq!(result.content, vec![ToolContent::text("request 7")]);

        let progress = ctx.take_progress();
        assert_eq!(progress.len(), 3);
        let last: Value = serde_json::from_str(&progress[2].to_line()).unwrap();
        assert_eq!(
            last["params"],
            json!({"progressToken": "sweep-1", "progress": 3.0, "total": 3.0})
        );
        assert!(ctx.take_progress().is_empty());
    }

    #[test]
    fn progress_without_token_is_dropped() {
        let mut ctx = ToolContext::new(RequestId::from(1), None);
        assert!(!ctx.report_progress(1.0, 0.0, "half"));
        assert!(ctx.progress_token().is_none());
        let result = stepper().call_in(&json!({}), &mut ctx);
        assert!(!result.is_error);
        assert!(ctx.take_progress().is_empty());
    }
}
