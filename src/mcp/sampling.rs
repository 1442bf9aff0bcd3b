//! `sampling/createMessage`: asking the client's model to generate text.

use serde::Serialize;
use serde_json::Value;

use crate::mcp::args::ArgsExt;
use crate::mcp::content::ToolContent;
use crate::mcp::outbound::{OutboundRequests, ServerRequest};
use crate::mcp::prompt::Role;

/// Sampling manager. Standalone it numbers requests from 9000; inside
/// `McpServer` IDs come from the shared server counter.
pub type SamplingManager = OutboundRequests<SamplingRequest>;

/// One conversation turn sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingMessage {
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: ToolContent,
}

/// A model name hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelHint {
    /// Substring of a model name, e.g. `haiku`.
    pub name: String,
}

/// Model selection preferences. Priorities are in `0.0..=1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    /// Name hints in preference order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<ModelHint>,
    /// Weight for low cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// Weight for low latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// Weight for capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

impl ModelPreferences {
    fn is_empty(&self) -> bool {
        self.hints.is_empty()
            && self.cost_priority.is_none()
            && self.speed_priority.is_none()
            && self.intelligence_priority.is_none()
    }
}

/// Which MCP server context the client should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    /// No extra context.
    None,
    /// Context from this server only.
    ThisServer,
    /// Context from every connected server.
    AllServers,
}

/// A `sampling/createMessage` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    /// Conversation so far.
    pub messages: Vec<SamplingMessage>,
    /// Model preferences.
    #[serde(skip_serializing_if = "ModelPreferences::is_empty")]
    pub model_preferences: ModelPreferences,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Context inclusion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,
    /// Token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Default for SamplingRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            model_preferences: ModelPreferences::default(),
            system_prompt: None,
            include_context: None,
            max_tokens: 256,
            temperature: None,
            stop_sequences: Vec::new(),
        }
    }
}

impl SamplingRequest {
    /// Creates a request with a single user message.
    #[must_use]
    pub fn new(user_message: impl Into<String>) -> Self {
        Self::default().user(user_message)
    }

    /// Appends a user message.
    #[must_use]
    pub fn user(mut self, text: impl Into<String>) -> Self {
        self.messages.push(SamplingMessage {
            role: Role::User,
            content: ToolContent::text(text),
        });
        self
    }

    /// Appends an assistant message.
    #[must_use]
    pub fn assistant(mut self, text: impl Into<String>) -> Self {
        self.messages.push(SamplingMessage {
            role: Role::Assistant,
            content: ToolContent::text(text),
        });
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the token budget.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Adds a model name hint.
    #[must_use]
    pub fn model_hint(mut self, name: impl Into<String>) -> Self {
        self.model_preferences.hints.push(ModelHint { name: name.into() });
        self
    }
}

impl ServerRequest for SamplingRequest {
    const METHOD: &'static str = "sampling/createMessage";
    const FIRST_ID: i64 = 9000;
    type Response = SamplingResponse;

    fn params(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialise sampling request");
            Value::Null
        })
    }

    fn parse_response(result: &Value) -> SamplingResponse {
        SamplingResponse::from_result(result)
    }

    fn error_response(error: &Value) -> SamplingResponse {
        tracing::warn!(%error, "Client rejected sampling request");
        SamplingResponse::default()
    }
}

/// The client's reply to a sampling request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingResponse {
    /// Usually `assistant`.
    pub role: String,
    /// Generated text.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// `endTurn`, `stopSequence` or `maxTokens`.
    pub stop_reason: String,
    /// `false` when the reply carried no text content.
    pub valid: bool,
}

impl SamplingResponse {
    /// Extracts whatever fields are present; the response is valid only
    /// if it carries non-empty text content.
    #[must_use]
    pub fn from_result(result: &Value) -> Self {
        let text = result
            .get_object("content")
            .filter(|c| c.get_str("type") == Some("text"))
            .and_then(|c| c.get_str("text"))
            .unwrap_or_default()
            .to_string();

        Self {
            role: result.str_or("role", "").to_string(),
            model: result.str_or("model", "").to_string(),
            stop_reason: result.str_or("stopReason", "").to_string(),
            valid: !text.is_empty(),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_shape() {
        let req = SamplingRequest::new("What does 42.5C mean?")
            .system_prompt("You are a thermostat")
            .max_tokens(100)
            .temperature(0.5)
            .model_hint("haiku");
        assert_eq!(
            req.params(),
            json!({
                "messages": [{"role": "user", "content": {"type": "text", "text": "What does 42.5C mean?"}}],
                "modelPreferences": {"hints": [{"name": "haiku"}]},
                "systemPrompt": "You are a thermostat",
                "maxTokens": 100,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn default_params_omit_optional_fields() {
        let params = SamplingRequest::new("hi").params();
        assert_eq!(params["maxTokens"], json!(256));
        assert!(params.get("modelPreferences").is_none());
        assert!(params.get("temperature").is_none());
    }

    #[test]
    fn parse_full_response() {
        let resp = SamplingResponse::from_result(&json!({
            "role": "assistant",
            "content": {"type": "text", "text": "It is warm."},
            "model": "claude",
            "stopReason": "endTurn"
        }));
        assert!(resp.valid);
        assert_eq!(resp.text, "It is warm.");
        assert_eq!(resp.model, "claude");
        assert_eq!(resp.stop_reason, "endTurn");
    }

    #[test]
    fn response_without_content_is_invalid() {
        let resp = SamplingResponse::from_result(&json!({"role": "assistant", "model": "m"}));
        assert!(!resp.valid);
        assert_eq!(resp.model, "m");

        let image = SamplingResponse::from_result(&json!({"content": {"type": "image", "data": "AA"}}));
        assert!(!image.valid);
    }

    #[test]
    fn manager_round_trip() {
        let mut mgr = SamplingManager::new();
        let id = mgr.queue_request(&SamplingRequest::new("hi"), |_| {});
        assert_eq!(id, 9000);
        let out = mgr.drain_outgoing();
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("sampling/createMessage"));
        assert!(out[0].contains("9000"));
    }
}
