//! Tool result content.
//!
//! A tool call returns a list of content items plus an `isError` flag.
//! Plain-string handlers produce a single text item; rich handlers build a
//! [`ToolCallResult`] directly.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;

/// An embedded resource carried inside content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    /// Resource URI.
    pub uri: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Text payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64-encoded binary payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64-encoded image.
    Image {
        /// Base64 data.
        data: String,
        /// e.g. `image/png`.
        mime_type: String,
    },
    /// Base64-encoded audio.
    Audio {
        /// Base64 data.
        data: String,
        /// e.g. `audio/wav`.
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The resource body.
        resource: EmbeddedResource,
    },
    /// A link to a resource the client can read separately.
    ResourceLink {
        /// Resource URI.
        uri: String,
        /// Resource name.
        name: String,
        /// MIME type, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// Human-readable description.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl ToolContent {
    /// Creates a text item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image item from already-encoded base64 data.
    #[must_use]
    pub fn image(base64_data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: base64_data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Creates an image item from raw bytes.
    #[must_use]
    pub fn image_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::image(BASE64_STANDARD.encode(bytes), mime_type)
    }

    /// Creates an audio item from already-encoded base64 data.
    #[must_use]
    pub fn audio(base64_data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Audio {
            data: base64_data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Creates an audio item from raw samples.
    #[must_use]
    pub fn audio_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::audio(BASE64_STANDARD.encode(bytes), mime_type)
    }

    /// Creates an embedded text resource.
    #[must_use]
    pub fn resource_text(
        uri: impl Into<String>,
        mime_type: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::Resource {
            resource: EmbeddedResource {
                uri: uri.into(),
                mime_type: mime_type.into(),
                text: Some(text.into()),
                blob: None,
            },
        }
    }

    /// Creates an embedded binary resource from raw bytes.
    #[must_use]
    pub fn resource_blob(uri: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Resource {
            resource: EmbeddedResource {
                uri: uri.into(),
                mime_type: mime_type.into(),
                text: None,
                blob: Some(BASE64_STANDARD.encode(bytes)),
            },
        }
    }

    /// Creates a resource link.
    #[must_use]
    pub fn resource_link(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ResourceLink {
            uri: uri.into(),
            name: name.into(),
            mime_type: None,
            description: None,
        }
    }
}

/// Result of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Machine-readable output matching the tool's output schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool, so we must take &bool here
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            ..Self::default()
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            structured_content: None,
            is_error: true,
        }
    }

    /// Creates an image result, preceded by alt text when given.
    #[must_use]
    pub fn image(base64_data: impl Into<String>, mime_type: impl Into<String>, alt_text: &str) -> Self {
        let mut result = Self::default();
        if !alt_text.is_empty() {
            result.content.push(ToolContent::text(alt_text));
        }
        result.content.push(ToolContent::image(base64_data, mime_type));
        result
    }

    /// Creates an audio result, preceded by a description when given.
    #[must_use]
    pub fn audio(base64_data: impl Into<String>, mime_type: impl Into<String>, description: &str) -> Self {
        let mut result = Self::default();
        if !description.is_empty() {
            result.content.push(ToolContent::text(description));
        }
        result.content.push(ToolContent::audio(base64_data, mime_type));
        result
    }

    /// Appends a content item.
    #[must_use]
    pub fn with(mut self, item: ToolContent) -> Self {
        self.content.push(item);
        self
    }

    /// Appends a content item in place.
    pub fn push(&mut self, item: ToolContent) -> &mut Self {
        self.content.push(item);
        self
    }
}
