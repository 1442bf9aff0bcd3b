//! Icons attached to tools, resources, templates and prompts for client UIs.

use serde::Serialize;

/// A displayable icon: a URI or `data:` URL plus optional hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Icon {
    /// URI or `data:` URL.
    pub src: String,
    /// e.g. `image/png`, `image/svg+xml`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// e.g. `48x48`, `any`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<String>,
    /// `light` or `dark`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Icon {
    /// Creates an icon from a source URI.
    #[must_use]
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Self::default()
        }
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Adds a size hint.
    #[must_use]
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.sizes.push(size.into());
        self
    }

    /// Sets the theme hint.
    #[must_use]
    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_icon_only_has_src() {
        let json = serde_json::to_value(Icon::new("https://example.com/a.png")).unwrap();
        assert_eq!(json, json!({"src": "https://example.com/a.png"}));
    }

    #[test]
    fn full_icon() {
        let icon = Icon::new("data:image/svg+xml;base64,AA")
            .mime_type("image/svg+xml")
            .size("48x48")
            .size("any")
            .theme("dark");
        let json = serde_json::to_value(icon).unwrap();
        assert_eq!(json["sizes"], json!(["48x48", "any"]));
        assert_eq!(json["mimeType"], json!("image/svg+xml"));
        assert_eq!(json["theme"], json!("dark"));
    }
}
