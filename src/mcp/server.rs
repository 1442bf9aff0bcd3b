//! MCP server: lifecycle, method routing and the single processing entry
//! point.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation, session creation
//! 2. **Operation**: Routing requests to the registries and managers
//! 3. **Shutdown**: Driven by the host transport
//!
//! # Architecture
//!
//! The server is a plain value with no I/O of its own. A host feeds it raw
//! text through [`McpServer::process_json_rpc`] and afterwards drains the
//! queued notifications and server-initiated requests. All state lives on
//! the instance, so several independent servers can coexist.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::mcp::args::{normalise_arguments, ArgsExt, Field};
use crate::mcp::cache::ToolResultCache;
use crate::mcp::completion::{CompletionManager, RefKind};
use crate::mcp::elicitation::{ElicitationManager, ElicitationRequest, ElicitationResponse};
use crate::mcp::groups::ToolGroups;
use crate::mcp::logging::{LogLevel, Logging};
use crate::mcp::notify::{ListKind, Notifier};
use crate::mcp::pagination::paginate;
use crate::mcp::prompt::{Prompt, PromptArguments};
use crate::mcp::protocol::{
    classify, parse_payload, ClientResponse, ErrorCode, IncomingMessage, JsonRpcError,
    JsonRpcErrorData, JsonRpcNotification, JsonRpcReply, JsonRpcRequest, JsonRpcResponse,
    OutgoingNotification, Payload, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::rate_limit::RateLimiter;
use crate::mcp::registry::Registry;
use crate::mcp::resource::{Resource, ResourceTemplate};
use crate::mcp::sampling::{SamplingManager, SamplingRequest, SamplingResponse};
use crate::mcp::session::SessionManager;
use crate::mcp::tool::{Tool, ToolContext};
use crate::mcp::tracker::RequestTracker;

/// Error code returned when `initialize` cannot open a session.
pub const SESSION_LIMIT: ErrorCode = ErrorCode::ServerError(-32001);

/// First ID handed to a server-initiated request. Sampling and elicitation
/// draw from one counter, so a reply ID always names a single request.
pub const FIRST_SERVER_REQUEST_ID: i64 = 8000;

/// Emitted if a reply cannot be serialised.
const FALLBACK_ERROR: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// Methods that expect a response. A notification naming one of these is
/// still dispatched, and its output discarded.
const REQUEST_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/templates/list",
    "resources/read",
    "resources/subscribe",
    "resources/unsubscribe",
    "prompts/list",
    "prompts/get",
    "roots/list",
    "completion/complete",
    "logging/setLevel",
];

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Present when tools are registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListCapability>,
    /// Present when resources or templates are registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceCapabilities>,
    /// Present when prompts are registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListCapability>,
    /// `logging/setLevel` and `notifications/message`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<EmptyCapability>,
    /// `completion/complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<EmptyCapability>,
    /// Present when roots are registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<ListCapability>,
    /// Server-initiated `sampling/createMessage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<EmptyCapability>,
    /// Server-initiated `elicitation/create`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<EmptyCapability>,
    /// Non-standard extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// A capability with no options; serialises as `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyCapability {}

/// A list capability.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ListCapability {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

/// Resource-specific capabilities.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapabilities {
    /// Whether `resources/subscribe` is supported.
    #[serde(skip_serializing_if = "is_false")]
    pub subscribe: bool,
    /// Whether the resource list can change during the session.
    #[serde(skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    #[serde(default)]
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request. Every field is optional; the
/// server always answers with its own protocol version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Settings applied by [`McpServer::with_config`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Name reported in `serverInfo`.
    pub name: Option<String>,
    /// Description reported in `serverInfo`.
    pub description: Option<String>,
    /// List page size; 0 disables pagination.
    pub page_size: usize,
    /// `(requests_per_second, burst_capacity)`; `None` leaves limiting off.
    pub rate_limit: Option<(f64, usize)>,
    /// Session cap; `None` keeps the default.
    pub max_sessions: Option<usize>,
    /// Session idle timeout; `None` keeps the default.
    pub idle_timeout: Option<Duration>,
    /// `(uri, name)` roots to register.
    pub roots: Vec<(String, String)>,
}

impl ServerConfig {
    /// Starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the server description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the list page size.
    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enables rate limiting.
    #[must_use]
    pub fn rate_limit(mut self, requests_per_second: f64, burst_capacity: usize) -> Self {
        self.rate_limit = Some((requests_per_second, burst_capacity));
        self
    }

    /// Sets the session cap.
    #[must_use]
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Sets the session idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Adds a root.
    #[must_use]
    pub fn root(mut self, uri: impl Into<String>, name: impl Into<String>) -> Self {
        self.roots.push((uri.into(), name.into()));
        self
    }
}

/// Callback run after a successful `initialize`, with the client name.
pub type InitializeHook = Box<dyn FnMut(&str)>;

/// The MCP server.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    info: ServerInfo,
    /// Name from the last `initialize`.
    client_name: String,
    session_id: Option<String>,
    registry: Registry,
    completions: CompletionManager,
    notifier: Notifier,
    tracker: RequestTracker,
    sampling: SamplingManager,
    elicitation: ElicitationManager,
    next_request_id: i64,
    groups: ToolGroups,
    cache: ToolResultCache,
    rate_limiter: RateLimiter,
    sessions: SessionManager,
    logging: Logging,
    page_size: usize,
    on_initialize: Option<InitializeHook>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("state", &self.state)
            .field("info", &self.info)
            .field("session_id", &self.session_id)
            .field("registry", &self.registry)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new(SERVER_NAME)
    }
}

impl McpServer {
    /// Creates a server with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            info: ServerInfo {
                name: name.into(),
                ..ServerInfo::default()
            },
            client_name: String::new(),
            session_id: None,
            registry: Registry::new(),
            completions: CompletionManager::new(),
            notifier: Notifier::new(),
            tracker: RequestTracker::new(),
            sampling: SamplingManager::new(),
            elicitation: ElicitationManager::new(),
            next_request_id: FIRST_SERVER_REQUEST_ID,
            groups: ToolGroups::new(),
            cache: ToolResultCache::new(),
            rate_limiter: RateLimiter::new(),
            sessions: SessionManager::new(),
            logging: Logging::default(),
            page_size: 0,
            on_initialize: None,
        }
    }

    /// Creates a server from a [`ServerConfig`].
    #[must_use]
    pub fn with_config(config: &ServerConfig) -> Self {
        let mut server = Self::new(config.name.as_deref().unwrap_or(SERVER_NAME));
        server.info.description.clone_from(&config.description);
        server.page_size = config.page_size;
        if let Some((rps, burst)) = config.rate_limit {
            server.rate_limiter.configure(rps, burst);
        }
        if let Some(max) = config.max_sessions {
            server.sessions.set_max_sessions(max);
        }
        if let Some(timeout) = config.idle_timeout {
            server.sessions.set_idle_timeout(timeout);
        }
        for (uri, name) in &config.roots {
            server.registry.add_root(uri.as_str(), name.as_str());
        }
        server
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Server identity reported in `initialize`.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Client name from the last `initialize`.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Session opened by the last `initialize`.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    // Registration

    /// Registers a tool, replacing any tool of the same name.
    pub fn add_tool(&mut self, tool: Tool) {
        self.registry.add_tool(tool);
    }

    /// Removes a tool. Returns `true` if it existed.
    pub fn remove_tool(&mut self, name: &str) -> bool {
        self.cache.invalidate_tool(name);
        self.groups.forget_tool(name);
        self.registry.remove_tool(name)
    }

    /// Registers a static resource.
    pub fn add_resource(&mut self, resource: Resource) {
        self.registry.add_resource(resource);
    }

    /// Removes a static resource. Returns `true` if it existed.
    pub fn remove_resource(&mut self, uri: &str) -> bool {
        self.registry.remove_resource(uri)
    }

    /// Registers a resource template.
    pub fn add_resource_template(&mut self, template: ResourceTemplate) {
        self.registry.add_template(template);
    }

    /// Removes a resource template. Returns `true` if it existed.
    pub fn remove_resource_template(&mut self, uri_template: &str) -> bool {
        self.registry.remove_template(uri_template)
    }

    /// Registers a prompt.
    pub fn add_prompt(&mut self, prompt: Prompt) {
        self.registry.add_prompt(prompt);
    }

    /// Removes a prompt. Returns `true` if it existed.
    pub fn remove_prompt(&mut self, name: &str) -> bool {
        self.registry.remove_prompt(name)
    }

    /// Registers a root.
    pub fn add_root(&mut self, uri: impl Into<String>, name: impl Into<String>) {
        self.registry.add_root(uri, name);
    }

    /// Removes a root. Returns `true` if it existed.
    pub fn remove_root(&mut self, uri: &str) -> bool {
        self.registry.remove_root(uri)
    }

    /// The catalogs.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Tool groups.
    #[must_use]
    pub const fn tool_groups(&self) -> &ToolGroups {
        &self.groups
    }

    /// Creates an enabled tool group. Returns `false` if it already exists.
    pub fn create_tool_group(&mut self, name: &str, description: &str) -> bool {
        self.groups.create_group(name, description)
    }

    /// Adds a tool to a group, creating the group if needed.
    pub fn add_tool_to_group(&mut self, group: &str, tool: &str) -> bool {
        self.groups.add_tool(group, tool)
    }

    /// Enables or disables a group. Queues `notifications/tools/list_changed`
    /// when the visible tool set may have changed.
    pub fn set_tool_group_enabled(&mut self, group: &str, enabled: bool) -> bool {
        let changed = self.groups.set_enabled(group, enabled);
        if changed {
            tracing::info!(group, enabled, "Tool group toggled");
            self.notifier.notify_list_changed(ListKind::Tools);
        }
        changed
    }

    /// The tool result cache.
    #[must_use]
    pub const fn cache(&self) -> &ToolResultCache {
        &self.cache
    }

    /// The tool result cache, mutably.
    pub fn cache_mut(&mut self) -> &mut ToolResultCache {
        &mut self.cache
    }

    /// Completion providers.
    pub fn completions_mut(&mut self) -> &mut CompletionManager {
        &mut self.completions
    }

    /// Registers a hook run after each successful `initialize`.
    pub fn on_initialize<F>(&mut self, hook: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.on_initialize = Some(Box::new(hook));
    }

    // Settings

    /// Sets the list page size; 0 disables pagination.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    /// Current list page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Enables rate limiting.
    pub fn set_rate_limit(&mut self, requests_per_second: f64, burst_capacity: usize) {
        self.rate_limiter.configure(requests_per_second, burst_capacity);
    }

    /// The rate limiter.
    #[must_use]
    pub const fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The rate limiter, mutably.
    pub fn rate_limiter_mut(&mut self) -> &mut RateLimiter {
        &mut self.rate_limiter
    }

    /// The session manager.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The session manager, mutably.
    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// The request tracker.
    #[must_use]
    pub const fn requests(&self) -> &RequestTracker {
        &self.tracker
    }

    /// The request tracker, mutably.
    pub fn requests_mut(&mut self) -> &mut RequestTracker {
        &mut self.tracker
    }

    /// Current client log threshold.
    #[must_use]
    pub const fn log_level(&self) -> LogLevel {
        self.logging.level()
    }

    // Notifications

    /// Returns `true` if the client subscribed to `uri`.
    #[must_use]
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.notifier.is_subscribed(uri)
    }

    /// Number of subscribed URIs.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.notifier.subscription_count()
    }

    /// Queues `notifications/resources/updated` if `uri` is subscribed.
    /// Returns `true` if a notification was queued.
    pub fn notify_resource_updated(&mut self, uri: &str) -> bool {
        self.notifier.notify_resource_updated(uri)
    }

    /// Queues `notifications/tools/list_changed`.
    pub fn notify_tools_changed(&mut self) {
        self.notifier.notify_list_changed(ListKind::Tools);
    }

    /// Queues `notifications/resources/list_changed`.
    pub fn notify_resources_changed(&mut self) {
        self.notifier.notify_list_changed(ListKind::Resources);
    }

    /// Queues `notifications/prompts/list_changed`.
    pub fn notify_prompts_changed(&mut self) {
        self.notifier.notify_list_changed(ListKind::Prompts);
    }

    /// Queues a `notifications/message` if `level` meets the client's
    /// threshold. Returns `true` if queued.
    pub fn log(&mut self, level: LogLevel, logger: &str, data: Value) -> bool {
        match self.logging.message(level, logger, data) {
            Some(notification) => {
                self.notifier.push(notification);
                true
            }
            None => false,
        }
    }

    /// Queues `notifications/progress`. A `total` of zero omits it.
    pub fn report_progress(&mut self, token: &str, progress: f64, total: f64, message: &str) {
        self.notifier
            .push(OutgoingNotification::progress(token, progress, total, message));
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn pending_notification_count(&self) -> usize {
        self.notifier.pending_count()
    }

    /// Takes every queued notification, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<String> {
        self.notifier.drain()
    }

    // Server-initiated requests

    /// Queues `sampling/createMessage`. Returns the allocated ID.
    pub fn request_sampling<F>(&mut self, request: &SamplingRequest, callback: F) -> i64
    where
        F: FnOnce(SamplingResponse) + 'static,
    {
        let id = self.allocate_request_id();
        self.sampling.queue_request_with_id(id, request, callback)
    }

    /// Queues `elicitation/create`. Returns the allocated ID.
    pub fn request_elicitation<F>(&mut self, request: &ElicitationRequest, callback: F) -> i64
    where
        F: FnOnce(ElicitationResponse) + 'static,
    {
        let id = self.allocate_request_id();
        self.elicitation.queue_request_with_id(id, request, callback)
    }

    fn allocate_request_id(&mut self) -> i64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// The sampling manager.
    #[must_use]
    pub const fn sampling(&self) -> &SamplingManager {
        &self.sampling
    }

    /// The elicitation manager.
    #[must_use]
    pub const fn elicitation(&self) -> &ElicitationManager {
        &self.elicitation
    }

    /// Drops sampling and elicitation requests unanswered for longer than
    /// `timeout`. Returns how many were dropped.
    pub fn prune_expired_requests(&mut self, timeout: Duration) -> usize {
        self.sampling.prune_expired(timeout) + self.elicitation.prune_expired(timeout)
    }

    /// Takes every queued outbound request: sampling first, then
    /// elicitation, each in issue order.
    pub fn drain_outgoing(&mut self) -> Vec<String> {
        let mut out = self.sampling.drain_outgoing();
        out.extend(self.elicitation.drain_outgoing());
        out
    }

    // Processing

    /// Processes one inbound payload and returns the text to send back.
    ///
    /// Returns an empty string when nothing should be sent: a lone
    /// notification, a client reply, an empty batch, or a batch of
    /// notifications.
    pub fn process_json_rpc(&mut self, text: &str) -> String {
        match parse_payload(text) {
            Err(error) => {
                tracing::debug!("Rejected unparseable payload");
                encode(&error)
            }
            Ok(Payload::Single(value)) => self
                .process_value(value)
                .map_or_else(String::new, |reply| encode(&reply)),
            Ok(Payload::Batch(items)) => {
                tracing::debug!(size = items.len(), "Processing batch");
                let replies: Vec<JsonRpcReply> = items
                    .into_iter()
                    .filter_map(|item| self.process_value(item))
                    .collect();
                if replies.is_empty() {
                    String::new()
                } else {
                    encode(&replies)
                }
            }
        }
    }

    fn process_value(&mut self, value: Value) -> Option<JsonRpcReply> {
        match classify(value) {
            Ok(msg) => self.handle_message(msg),
            Err(error) => Some(JsonRpcReply::Error(error)),
        }
    }

    /// Handles a classified message. Returns the reply, if one is due.
    pub fn handle_message(&mut self, msg: IncomingMessage) -> Option<JsonRpcReply> {
        match msg {
            IncomingMessage::Request(req) => {
                if !self.rate_limiter.try_acquire() {
                    tracing::warn!(method = %req.method, id = %req.id, "Rate limit exceeded");
                    return Some(JsonRpcReply::Error(JsonRpcError::rate_limited(req.id)));
                }
                Some(self.handle_request(&req).into())
            }
            IncomingMessage::Notification(notif) => {
                self.handle_notification(notif);
                None
            }
            IncomingMessage::Response(resp) => {
                self.handle_client_response(&resp);
                None
            }
        }
    }

    /// Handles an incoming request.
    fn handle_request(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        tracing::debug!(method = %req.method, id = %req.id, "Handling request");

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => Ok(Self::handle_ping(req)),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "resources/list" => self.handle_resources_list(req),
            "resources/templates/list" => self.handle_templates_list(req),
            "resources/read" => self.handle_resources_read(req),
            "resources/subscribe" => self.handle_subscribe(req, true),
            "resources/unsubscribe" => self.handle_subscribe(req, false),
            "prompts/list" => self.handle_prompts_list(req),
            "prompts/get" => self.handle_prompts_get(req),
            "roots/list" => self.handle_roots_list(req),
            "completion/complete" => self.handle_complete(req),
            "logging/setLevel" => self.handle_set_level(req),
            _ => {
                tracing::debug!(method = %req.method, "Unknown method");
                Err(JsonRpcError::method_not_found(req.id.clone(), &req.method))
            }
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                if self.state == ServerState::Initialising {
                    self.state = ServerState::Running;
                }
            }
            "notifications/cancelled" => {
                let id = notif
                    .params
                    .as_ref()
                    .and_then(|p| p.field("requestId").value())
                    .and_then(RequestId::from_value);
                if let Some(id) = id {
                    let cancelled = self.tracker.cancel_request(&id);
                    tracing::debug!(%id, cancelled, "Cancellation received");
                }
            }
            method if REQUEST_METHODS.contains(&method) => {
                let req = JsonRpcRequest::new(RequestId::Null, method, notif.params);
                // Side effects only; notifications never get a reply
                let _ = self.handle_request(&req);
            }
            method => tracing::debug!(method, "Ignoring notification"),
        }
    }

    /// Routes a client reply to whichever manager issued the request.
    fn handle_client_response(&mut self, resp: &ClientResponse) {
        let Some(id) = resp.id.as_i64() else {
            tracing::warn!(id = %resp.id, "Client response with non-integer id");
            return;
        };

        let handled = match &resp.outcome {
            Ok(result) => {
                self.sampling.handle_response(id, result) || self.elicitation.handle_response(id, result)
            }
            Err(error) => {
                self.sampling.handle_error(id, error) || self.elicitation.handle_error(id, error)
            }
        };

        if !handled {
            tracing::debug!(id, "No pending request for client response");
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        // Lenient: malformed params are treated as empty
        let params: InitializeParams = req
            .params
            .as_ref()
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_default();
        let client_name = params.client_info.map(|c| c.name).unwrap_or_default();

        if let Some(previous) = self.session_id.take() {
            self.sessions.remove_session(&previous);
        }
        let session_id = self.sessions.create_session(&client_name).map_err(|e| {
            JsonRpcError::new(
                req.id.clone(),
                JsonRpcErrorData::with_message(SESSION_LIMIT, e.to_string()),
            )
        })?;

        tracing::info!(
            client = %client_name,
            requested_version = params.protocol_version.as_deref().unwrap_or(""),
            session = %session_id,
            "Client initialised"
        );

        self.session_id = Some(session_id);
        self.client_name.clone_from(&client_name);
        self.state = ServerState::Initialising;

        if let Some(hook) = self.on_initialize.as_mut() {
            hook(&client_name);
        }

        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": self.capabilities(),
            "serverInfo": self.info,
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Capabilities as currently registered.
    #[must_use]
    pub fn capabilities(&self) -> ServerCapabilities {
        let list = Some(ListCapability { list_changed: true });

        ServerCapabilities {
            tools: if self.registry.has_tools() { list } else { None },
            resources: self.registry.has_resources().then_some(ResourceCapabilities {
                subscribe: true,
                list_changed: true,
            }),
            prompts: if self.registry.has_prompts() { list } else { None },
            logging: Some(EmptyCapability {}),
            completions: Some(EmptyCapability {}),
            roots: self
                .registry
                .has_roots()
                .then_some(ListCapability { list_changed: false }),
            sampling: Some(EmptyCapability {}),
            elicitation: Some(EmptyCapability {}),
            experimental: self.rate_limiter.is_enabled().then(|| {
                json!({
                    "rateLimit": {
                        "requestsPerSecond": self.rate_limiter.requests_per_second(),
                        "burstCapacity": self.rate_limiter.burst_capacity(),
                    }
                })
            }),
        }
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let tools: Vec<_> = self
            .registry
            .tools()
            .into_iter()
            .filter(|tool| !self.groups.is_tool_disabled(&tool.name))
            .map(Tool::definition)
            .collect();
        self.list_page(req, "tools", tools)
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let params = req.params_or_null();

        let name = params
            .get_str("name")
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing tool name"))?;
        let tool = self.registry.tool(name).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Tool not found: {name}"))
        })?;
        if self.groups.is_tool_disabled(name) {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                format!("Tool disabled: {name}"),
            ));
        }

        let arguments = normalise_arguments(params.field("arguments").value());
        if let Some(cached) = self.cache.get(name, &arguments) {
            let result_value = serialise(&req.id, &cached)?;
            return Ok(JsonRpcResponse::success(req.id.clone(), result_value));
        }

        let progress_token = params
            .get_object("_meta")
            .and_then(|meta| meta.field("progressToken").value())
            .and_then(|token| match token {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let tracked = progress_token.is_some();
        if tracked {
            self.tracker.track_request(req.id.clone(), progress_token.clone());
        }

        tracing::debug!(tool = %tool.name, "Calling tool");
        let mut context = ToolContext::new(req.id.clone(), progress_token);
        let result = tool.call_in(&arguments, &mut context);
        for notification in context.take_progress() {
            self.notifier.push(notification);
        }
        if result.is_error {
            tracing::warn!(tool = %tool.name, "Tool returned an error result");
        } else {
            self.cache.put(name, &arguments, &result);
        }

        if tracked && self.tracker.complete_request(&req.id) {
            tracing::debug!(id = %req.id, "Tool call completed after cancellation");
        }

        let result_value = serialise(&req.id, &result)?;
        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the resources/list request.
    fn handle_resources_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let resources: Vec<_> = self
            .registry
            .resources()
            .into_iter()
            .map(Resource::definition)
            .collect();
        self.list_page(req, "resources", resources)
    }

    /// Handles the resources/templates/list request.
    fn handle_templates_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let templates: Vec<_> = self
            .registry
            .templates()
            .into_iter()
            .map(ResourceTemplate::definition)
            .collect();
        self.list_page(req, "resourceTemplates", templates)
    }

    /// Handles the resources/read request.
    fn handle_resources_read(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let uri = req
            .params_or_null()
            .get_str("uri")
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing resource URI"))?;

        let target = self.registry.find_resource(uri).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Resource not found: {uri}"))
        })?;

        let contents = target.read(uri).map_err(|e| {
            tracing::error!(%uri, error = %e, "Resource read failed");
            JsonRpcError::internal_error(req.id.clone(), format!("Resource read failed: {e}"))
        })?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "contents": [contents] }),
        ))
    }

    /// Handles resources/subscribe and resources/unsubscribe.
    fn handle_subscribe(
        &mut self,
        req: &JsonRpcRequest,
        subscribe: bool,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let uri = req
            .params_or_null()
            .get_str("uri")
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing resource URI"))?;

        let changed = if subscribe {
            self.notifier.subscribe(uri)
        } else {
            self.notifier.unsubscribe(uri)
        };
        tracing::debug!(%uri, subscribe, changed, "Subscription updated");

        Ok(JsonRpcResponse::success(req.id.clone(), json!({})))
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let prompts: Vec<_> = self
            .registry
            .prompts()
            .into_iter()
            .map(Prompt::definition)
            .collect();
        self.list_page(req, "prompts", prompts)
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let params = req.params_or_null();

        let name = params
            .get_str("name")
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing prompt name"))?;
        let prompt = self.registry.prompt(name).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Prompt not found: {name}"))
        })?;

        let arguments = prompt_arguments(params.get_object("arguments"));
        if let Some(missing) = prompt.missing_required(&arguments) {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                format!("Missing required argument: {missing}"),
            ));
        }

        let messages = catch_unwind(AssertUnwindSafe(|| prompt.render(&arguments))).map_err(|_| {
            tracing::error!(prompt = %name, "Prompt handler panicked");
            JsonRpcError::internal_error(req.id.clone(), "Prompt handler failed")
        })?;

        let result = json!({
            "description": prompt.description,
            "messages": serialise(&req.id, &messages)?,
        });
        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the roots/list request.
    fn handle_roots_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let roots = self.registry.roots();
        self.list_page(req, "roots", roots)
    }

    /// Handles the completion/complete request.
    fn handle_complete(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let params = req.params_or_null();

        let reference = params
            .get_object("ref")
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing ref"))?;
        let argument = params
            .get_object("argument")
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing argument"))?;

        let ref_type = reference.str_or("type", "");
        let kind = RefKind::parse(ref_type).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Unknown ref type: {ref_type}"))
        })?;
        let target = match kind {
            RefKind::Prompt => reference.str_or("name", ""),
            RefKind::Resource => reference.str_or("uri", ""),
        };
        let arg_name = argument.str_or("name", "");
        let partial = argument.str_or("value", "");

        let completion = catch_unwind(AssertUnwindSafe(|| {
            self.completions.complete(kind, target, arg_name, partial)
        }))
        .unwrap_or_else(|_| {
            tracing::error!(%target, argument = %arg_name, "Completion provider panicked");
            Default::default()
        });

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "completion": serialise(&req.id, &completion)? }),
        ))
    }

    /// Handles the logging/setLevel request.
    fn handle_set_level(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let level = match req.params_or_null().field("level") {
            Field::Missing | Field::Null => {
                return Err(JsonRpcError::invalid_params(req.id.clone(), "Missing level"));
            }
            Field::Present(value) => LogLevel::from_str_lenient(value.as_str().unwrap_or("")),
        };

        self.logging.set_level(level);
        tracing::debug!(%level, "Client log level changed");
        Ok(JsonRpcResponse::success(req.id.clone(), json!({})))
    }

    /// Builds a paginated list result under `key`.
    fn list_page<T: Serialize>(
        &self,
        req: &JsonRpcRequest,
        key: &str,
        items: Vec<T>,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let cursor = req.params_or_null().get_str("cursor");
        let page = paginate(items, self.page_size, cursor)
            .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), e.to_string()))?;

        let mut result = Map::new();
        result.insert(key.to_string(), serialise(&req.id, &page.items)?);
        if let Some(next) = page.next_cursor {
            result.insert("nextCursor".into(), Value::String(next));
        }
        Ok(JsonRpcResponse::success(req.id.clone(), Value::Object(result)))
    }
}

/// Collects prompt arguments. Strings are taken verbatim, `null` is
/// skipped, and other values use their JSON text.
fn prompt_arguments(arguments: Option<&Map<String, Value>>) -> PromptArguments {
    arguments
        .into_iter()
        .flatten()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}

fn serialise<T: Serialize + ?Sized>(id: &RequestId, value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialise result");
        JsonRpcError::internal_error(id.clone(), "Internal error: failed to serialise result")
    })
}

fn encode<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialise reply");
        FALLBACK_ERROR.to_string()
    })
}
