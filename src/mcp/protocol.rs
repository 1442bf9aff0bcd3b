//! JSON-RPC 2.0 message types and the wire format codec.
//!
//! This module defines the message types used by the Model Context Protocol
//! and the validation rules applied to every inbound payload.
//!
//! # Message Types
//!
//! - **Request**: A message expecting a response (has `id`, which may be `null`)
//! - **Notification**: A one-way message (no `id` key at all)
//! - **Response**: A client's reply to a server-initiated request
//!   (has `id` and `result` or `error`, no `method`)
//!
//! # Validation Order
//!
//! 1. The payload must parse as JSON, and be an object or an array (batch)
//! 2. `jsonrpc` must be the literal string `"2.0"`
//! 3. `method` must be present; a non-string or empty method is routed and
//!    rejected as an unknown method

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Default server name for capability negotiation.
pub const SERVER_NAME: &str = "mcpd";

/// A JSON-RPC 2.0 request ID.
///
/// Any scalar ID the client sends is echoed back exactly as received,
/// including `null`, negative and fractional numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID (integer or float, kept verbatim).
    Number(serde_json::Number),
    /// String request ID.
    String(String),
    /// Explicit `null` ID, also used when the ID cannot be determined.
    Null,
}

impl RequestId {
    /// Returns the ID as an `i64` if it is an integral number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::String(_) | Self::Null => None,
        }
    }

    /// Converts a raw JSON value into an ID. Objects, arrays and booleans
    /// are not valid IDs.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null => Some(Self::Null),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
///
/// Requests expect a response from the server.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    /// Request identifier, echoed back in the response.
    pub id: RequestId,

    /// The method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Returns the params, or `Value::Null` when absent.
    #[must_use]
    pub fn params_or_null(&self) -> &Value {
        self.params.as_ref().unwrap_or(&Value::Null)
    }
}

/// A JSON-RPC 2.0 notification message (incoming).
///
/// Notifications do not have an ID and do not expect a response.
#[derive(Debug, Clone)]
pub struct JsonRpcNotification {
    /// The notification method.
    pub method: String,

    /// Optional parameters for the notification.
    pub params: Option<Value>,
}

/// A client's reply to a request the server issued.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    /// The ID the server allocated for its request.
    pub id: RequestId,

    /// `Ok(result)` or `Err(error object)`.
    pub outcome: Result<Value, Value>,
}

/// An outgoing JSON-RPC 2.0 notification (server to client).
///
/// Used for resource updates, list changes, log messages and progress.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingNotification {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The notification method.
    pub method: String,

    /// Optional parameters for the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl OutgoingNotification {
    /// Creates a new outgoing notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }

    /// Creates a progress notification. A `total` of zero means the
    /// amount of work is unknown and is omitted.
    #[must_use]
    pub fn progress(progress_token: &str, progress: f64, total: f64, message: &str) -> Self {
        let mut params = Map::new();
        params.insert("progressToken".into(), json!(progress_token));
        params.insert("progress".into(), json!(progress));
        if total > 0.0 {
            params.insert("total".into(), json!(total));
        }
        if !message.is_empty() {
            params.insert("message".into(), json!(message));
        }
        Self::new("notifications/progress", Some(Value::Object(params)))
    }

    /// Serialises the notification as a single line of JSON.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), json!(self.jsonrpc));
        obj.insert("method".into(), json!(self.method));
        if let Some(params) = &self.params {
            obj.insert("params".into(), params.clone());
        }
        Value::Object(obj).to_string()
    }
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to.
    pub id: RequestId,

    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Server-defined error.
    ServerError(i32),
}

/// Code used when the rate limiter rejects a request.
pub const RATE_LIMITED: ErrorCode = ErrorCode::ServerError(-32000);

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this error corresponds to, `null` if unknown.
    pub id: RequestId,

    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: RequestId, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error,
        }
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(
            RequestId::Null,
            JsonRpcErrorData::from_code(ErrorCode::ParseError),
        )
    }

    /// Creates an invalid request error response with a specific reason.
    #[must_use]
    pub fn invalid_request(id: RequestId, reason: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(
                ErrorCode::InvalidRequest,
                format!("Invalid Request: {reason}"),
            ),
        )
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                format!("Method not found: {method}"),
            ),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }

    /// Creates a rate limit rejection.
    #[must_use]
    pub fn rate_limited(id: RequestId) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(RATE_LIMITED, "Rate limit exceeded"),
        )
    }
}

/// A single reply produced for one inbound request.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    /// A `result` response.
    Success(JsonRpcResponse),
    /// An `error` response.
    Error(JsonRpcError),
}

impl From<Result<JsonRpcResponse, JsonRpcError>> for JsonRpcReply {
    fn from(result: Result<JsonRpcResponse, JsonRpcError>) -> Self {
        match result {
            Ok(resp) => Self::Success(resp),
            Err(err) => Self::Error(err),
        }
    }
}

/// An incoming message.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
    /// A reply to a server-initiated request.
    Response(ClientResponse),
}

impl IncomingMessage {
    /// Returns the request ID if this is a request or response.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Response(resp) => Some(&resp.id),
            Self::Notification(_) => None,
        }
    }
}

/// A decoded inbound payload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A single JSON object.
    Single(Value),
    /// A JSON array of messages.
    Batch(Vec<Value>),
}

/// Parses raw text into a single message or a batch.
///
/// # Errors
///
/// Returns a parse error if the text is not JSON, or if the top-level value
/// is neither an object nor an array.
pub fn parse_payload(text: &str) -> Result<Payload, JsonRpcError> {
    let value: Value = serde_json::from_str(text).map_err(|_| JsonRpcError::parse_error())?;

    match value {
        Value::Array(items) => Ok(Payload::Batch(items)),
        obj @ Value::Object(_) => Ok(Payload::Single(obj)),
        _ => Err(JsonRpcError::parse_error()),
    }
}

/// Classifies one JSON value as a request, notification or client response.
///
/// # Errors
///
/// Returns an invalid request error (echoing the ID when one could be read)
/// if the value is not an object, `jsonrpc` is not `"2.0"`, `method` is
/// absent, or the ID has an unusable type.
pub fn classify(value: Value) -> Result<IncomingMessage, JsonRpcError> {
    let Value::Object(mut obj) = value else {
        return Err(JsonRpcError::invalid_request(
            RequestId::Null,
            "message must be an object",
        ));
    };

    let id = match obj.get("id") {
        None => None,
        Some(raw) => Some(RequestId::from_value(raw).ok_or_else(|| {
            JsonRpcError::invalid_request(RequestId::Null, "id must be a string, number or null")
        })?),
    };
    let error_id = id.clone().unwrap_or(RequestId::Null);

    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcError::invalid_request(
            error_id,
            "jsonrpc field must be \"2.0\"",
        ));
    }

    let method = match obj.remove("method") {
        Some(Value::String(s)) => s,
        // Present but not a string: routed so it is rejected as unknown
        Some(other) => other.to_string(),
        None => {
            return match (id, obj.remove("result"), obj.remove("error")) {
                (Some(id), Some(result), _) => Ok(IncomingMessage::Response(ClientResponse {
                    id,
                    outcome: Ok(result),
                })),
                (Some(id), None, Some(error)) => Ok(IncomingMessage::Response(ClientResponse {
                    id,
                    outcome: Err(error),
                })),
                _ => Err(JsonRpcError::invalid_request(error_id, "missing method")),
            };
        }
    };

    let params = obj.remove("params");

    Ok(match id {
        Some(id) => IncomingMessage::Request(JsonRpcRequest { id, method, params }),
        None => IncomingMessage::Notification(JsonRpcNotification { method, params }),
    })
}

/// Parses a JSON string into a single incoming message.
///
/// # Errors
///
/// Returns a `JsonRpcError` if the JSON is malformed or not a valid message.
/// Arrays are rejected here; use [`parse_payload`] for batch support.
pub fn parse_message(json: &str) -> Result<IncomingMessage, JsonRpcError> {
    match parse_payload(json)? {
        Payload::Single(value) => classify(value),
        Payload::Batch(_) => Err(JsonRpcError::invalid_request(
            RequestId::Null,
            "batch not allowed here",
        )),
    }
}
