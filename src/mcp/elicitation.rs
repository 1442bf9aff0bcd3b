//! `elicitation/create`: asking the human at the client for structured input.

use serde_json::{json, Map, Value};

use crate::mcp::args::ArgsExt;
use crate::mcp::outbound::{OutboundRequests, ServerRequest};

/// Elicitation manager. Standalone it numbers requests from 8000; inside
/// `McpServer` IDs come from the shared server counter.
pub type ElicitationManager = OutboundRequests<ElicitationRequest>;

/// Primitive type of a requested field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free text, optionally restricted to an enumeration.
    String,
    /// Floating-point number.
    Number,
    /// Whole number.
    Integer,
    /// Yes/no.
    Boolean,
}

impl FieldType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One input field of an elicitation form.
#[derive(Debug, Clone, PartialEq)]
pub struct ElicitationField {
    /// Property name in the returned content.
    pub name: String,
    /// Primitive type.
    pub field_type: FieldType,
    /// Display label.
    pub title: Option<String>,
    /// Help text.
    pub description: Option<String>,
    /// Whether the user must fill it in.
    pub required: bool,
    /// Allowed values for string fields.
    pub enum_values: Vec<String>,
    /// Lower bound for numeric fields.
    pub minimum: Option<f64>,
    /// Upper bound for numeric fields.
    pub maximum: Option<f64>,
}

impl ElicitationField {
    /// Creates an optional field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            title: None,
            description: None,
            required: false,
            enum_values: Vec::new(),
            minimum: None,
            maximum: None,
        }
    }

    /// Marks the field required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts a string field to the given values.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Bounds a numeric field.
    #[must_use]
    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    fn schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.field_type.as_str()));
        if let Some(title) = &self.title {
            prop.insert("title".into(), json!(title));
        }
        if let Some(description) = &self.description {
            prop.insert("description".into(), json!(description));
        }
        if !self.enum_values.is_empty() {
            prop.insert("enum".into(), json!(self.enum_values));
        }
        if let Some(min) = self.minimum {
            prop.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".into(), json!(max));
        }
        Value::Object(prop)
    }
}

/// An `elicitation/create` request: a message plus a flat form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElicitationRequest {
    /// Text shown to the user.
    pub message: String,
    /// Requested fields, in display order.
    pub fields: Vec<ElicitationField>,
}

impl ElicitationRequest {
    /// Creates a request with no fields.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: ElicitationField) -> Self {
        self.fields.push(field);
        self
    }

    /// The `requestedSchema` object.
    #[must_use]
    pub fn requested_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl ServerRequest for ElicitationRequest {
    const METHOD: &'static str = "elicitation/create";
    const FIRST_ID: i64 = 8000;
    type Response = ElicitationResponse;

    fn params(&self) -> Value {
        json!({
            "message": self.message,
            "requestedSchema": self.requested_schema(),
        })
    }

    fn parse_response(result: &Value) -> ElicitationResponse {
        ElicitationResponse::from_result(result)
    }

    fn error_response(error: &Value) -> ElicitationResponse {
        tracing::warn!(%error, "Client rejected elicitation request");
        ElicitationResponse {
            action: ElicitationAction::Cancel,
            content: Map::new(),
        }
    }
}

/// What the user did with the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElicitationAction {
    /// Submitted; `content` holds the values.
    Accept,
    /// Explicitly refused.
    Decline,
    /// Dismissed without choosing.
    Cancel,
}

/// The client's reply to an elicitation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ElicitationResponse {
    /// User action.
    pub action: ElicitationAction,
    /// Submitted values; empty unless accepted.
    pub content: Map<String, Value>,
}

impl ElicitationResponse {
    /// Parses a reply. Unknown or missing actions count as `Cancel`.
    #[must_use]
    pub fn from_result(result: &Value) -> Self {
        let action = match result.get_str("action") {
            Some("accept") => ElicitationAction::Accept,
            Some("decline") => ElicitationAction::Decline,
            _ => ElicitationAction::Cancel,
        };
        let content = match action {
            ElicitationAction::Accept => result.get_object("content").cloned().unwrap_or_default(),
            ElicitationAction::Decline | ElicitationAction::Cancel => Map::new(),
        };
        Self { action, content }
    }

    /// Returns `true` if the user submitted the form.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.action == ElicitationAction::Accept
    }

    /// String field or `default`.
    #[must_use]
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.content.str_or(key, default)
    }

    /// Integer field or `default`.
    #[must_use]
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.content.i64_or(key, default)
    }

    /// Number field or `default`.
    #[must_use]
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.content.f64_or(key, default)
    }

    /// Boolean field or `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.content.bool_or(key, default)
    }
}
