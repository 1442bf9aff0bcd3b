//! Prompt templates.

use indexmap::IndexMap;
use serde::Serialize;

use crate::mcp::content::ToolContent;
use crate::mcp::icon::Icon;

/// Argument values supplied to prompts/get.
pub type PromptArguments = IndexMap<String, String>;

/// Builds the message sequence for a prompt.
pub type PromptHandler = Box<dyn Fn(&PromptArguments) -> Vec<PromptMessage>>;

/// A declared prompt argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether prompts/get must supply it.
    pub required: bool,
}

impl PromptArgument {
    /// A required argument.
    #[must_use]
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    /// An optional argument.
    #[must_use]
    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side.
    User,
    /// The model side.
    Assistant,
}

/// One message produced by a prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    /// Author.
    pub role: Role,
    /// Body.
    pub content: ToolContent,
}

impl PromptMessage {
    /// A user text message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: ToolContent::text(text),
        }
    }

    /// An assistant text message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: ToolContent::text(text),
        }
    }

    /// A message embedding a text resource.
    #[must_use]
    pub fn resource(
        role: Role,
        uri: impl Into<String>,
        mime_type: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            role,
            content: ToolContent::resource_text(uri, mime_type, text),
        }
    }
}

/// A registered prompt.
pub struct Prompt {
    /// Unique name.
    pub name: String,
    /// Display title.
    pub title: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Declared arguments, in order.
    pub arguments: Vec<PromptArgument>,
    /// UI icons.
    pub icons: Vec<Icon>,
    handler: PromptHandler,
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// A prompts/list entry.
#[derive(Debug, Serialize)]
pub struct PromptDefinition<'a> {
    /// Unique name.
    pub name: &'a str,
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    /// Human-readable description.
    pub description: &'a str,
    /// Declared arguments.
    #[serde(skip_serializing_if = "<[PromptArgument]>::is_empty")]
    pub arguments: &'a [PromptArgument],
    /// UI icons.
    #[serde(skip_serializing_if = "<[Icon]>::is_empty")]
    pub icons: &'a [Icon],
}

impl Prompt {
    /// Creates a prompt.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        arguments: Vec<PromptArgument>,
        handler: F,
    ) -> Self
    where
        F: Fn(&PromptArguments) -> Vec<PromptMessage> + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            arguments,
            icons: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds an icon.
    #[must_use]
    pub fn icon(mut self, icon: Icon) -> Self {
        self.icons.push(icon);
        self
    }

    /// Returns the prompts/list entry.
    #[must_use]
    pub fn definition(&self) -> PromptDefinition<'_> {
        PromptDefinition {
            name: &self.name,
            title: self.title.as_deref(),
            description: &self.description,
            arguments: &self.arguments,
            icons: &self.icons,
        }
    }

    /// Returns the first required argument absent from `supplied`.
    #[must_use]
    pub fn missing_required(&self, supplied: &PromptArguments) -> Option<&str> {
        self.arguments
            .iter()
            .find(|arg| arg.required && !supplied.contains_key(&arg.name))
            .map(|arg| arg.name.as_str())
    }

    /// Runs the handler.
    #[must_use]
    pub fn render(&self, arguments: &PromptArguments) -> Vec<PromptMessage> {
        (self.handler)(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diagnose() -> Prompt {
        Prompt::new(
            "diagnose",
            "Diagnose a sensor",
            vec![
                PromptArgument::required("sensor", "Sensor id"),
                PromptArgument::optional("detail", "Verbosity"),
            ],
            |args| {
                vec![PromptMessage::user(format!(
                    "Check sensor {}",
                    args.get("sensor").map_or("?", String::as_str)
                ))]
            },
        )
    }

    #[test]
    fn missing_required_argument() {
        let prompt = diagnose();
        assert_eq!(prompt.missing_required(&PromptArguments::new()), Some("sensor"));

        let mut args = PromptArguments::new();
        args.insert("sensor".into(), "t1".into());
        assert_eq!(prompt.missing_required(&args), None);
    }

    #[test]
    fn render_messages() {
        let mut args = PromptArguments::new();
        args.insert("sensor".into(), "t1".into());
        let messages = diagnose().render(&args);
        assert_eq!(
            serde_json::to_value(&messages).unwrap(),
            json!([{"role": "user", "content": {"type": "text", "text": "Check sensor t1"}}])
        );
    }

    #[test]
    fn definition_lists_arguments() {
        let json = serde_json::to_value(diagnose().title("Diagnose").definition()).unwrap();
        assert_eq!(json["title"], json!("Diagnose"));
        assert_eq!(json["arguments"][0], json!({"name": "sensor", "description": "Sensor id", "required": true}));
        assert_eq!(json["arguments"][1]["required"], json!(false));
    }

    #[test]
    fn resource_message() {
        let msg = PromptMessage::resource(Role::Assistant, "log://boot", "text/plain", "ok");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], json!("assistant"));
        assert_eq!(json["content"]["resource"]["uri"], json!("log://boot"));
    }
}
