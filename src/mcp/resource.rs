//! Static resources and URI-template resources.

use std::panic::{catch_unwind, AssertUnwindSafe};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ToolError;
use crate::mcp::icon::Icon;

/// Variables bound by a URI template match, in template order.
pub type Variables = IndexMap<String, String>;

/// Producer for a static resource.
pub type ResourceHandler = Box<dyn Fn() -> Result<String, ToolError>>;

/// Producer for a templated resource.
pub type TemplateHandler = Box<dyn Fn(&Variables) -> Result<String, ToolError>>;

/// Audience and priority hints for a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceAnnotations {
    /// Intended readers: `user`, `assistant`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
    /// Relative importance between 0.0 and 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

impl ResourceAnnotations {
    /// Adds an audience entry.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    /// Sets the priority, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority.clamp(0.0, 1.0));
        self
    }
}

/// One entry of a resources/read `contents` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// URI that was read.
    pub uri: String,
    /// MIME type of the text.
    pub mime_type: String,
    /// Produced content.
    pub text: String,
}

/// A static resource with a fixed URI.
pub struct Resource {
    /// Unique URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the produced content.
    pub mime_type: String,
    /// Optional annotations.
    pub annotations: Option<ResourceAnnotations>,
    /// UI icons.
    pub icons: Vec<Icon>,
    handler: ResourceHandler,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// A resources/list entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition<'a> {
    /// Unique URI.
    pub uri: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Human-readable description.
    pub description: &'a str,
    /// MIME type.
    pub mime_type: &'a str,
    /// Annotations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<&'a ResourceAnnotations>,
    /// UI icons.
    #[serde(skip_serializing_if = "<[Icon]>::is_empty")]
    pub icons: &'a [Icon],
}

impl Resource {
    /// Creates a static resource.
    pub fn new<F>(
        uri: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn() -> Result<String, ToolError> + 'static,
    {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: description.into(),
            mime_type: mime_type.into(),
            annotations: None,
            icons: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Sets the annotations.
    #[must_use]
    pub fn annotations(mut self, annotations: ResourceAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Adds an icon.
    #[must_use]
    pub fn icon(mut self, icon: Icon) -> Self {
        self.icons.push(icon);
        self
    }

    /// Returns the resources/list entry.
    #[must_use]
    pub fn definition(&self) -> ResourceDefinition<'_> {
        ResourceDefinition {
            uri: &self.uri,
            name: &self.name,
            description: &self.description,
            mime_type: &self.mime_type,
            annotations: self.annotations.as_ref(),
            icons: &self.icons,
        }
    }

    /// Produces the resource content.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or [`ToolError::Failed`] if it panicked.
    pub fn read(&self) -> Result<ResourceContents, ToolError> {
        let text = guarded(&self.uri, || (self.handler)())?;
        Ok(ResourceContents {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
            text,
        })
    }
}

/// One piece of a parsed URI template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Variable(&'a str),
}

/// Splits a template into literals and `{variable}` placeholders.
/// Returns `None` for an unterminated placeholder.
fn segments(template: &str) -> Option<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        match rest.find('{') {
            None => {
                out.push(Segment::Literal(rest));
                break;
            }
            Some(start) => {
                if start > 0 {
                    out.push(Segment::Literal(&rest[..start]));
                }
                let end = rest[start..].find('}')? + start;
                out.push(Segment::Variable(&rest[start + 1..end]));
                rest = &rest[end + 1..];
            }
        }
    }
    Some(out)
}

/// A resource whose URI is a level 1 URI template such as
/// `sensor://{sensor_id}/reading`.
pub struct ResourceTemplate {
    /// The URI template.
    pub uri_template: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the produced content.
    pub mime_type: String,
    /// Optional annotations.
    pub annotations: Option<ResourceAnnotations>,
    /// UI icons.
    pub icons: Vec<Icon>,
    handler: TemplateHandler,
}

impl std::fmt::Debug for ResourceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTemplate")
            .field("uri_template", &self.uri_template)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A resources/templates/list entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDefinition<'a> {
    /// The URI template.
    pub uri_template: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Human-readable description.
    pub description: &'a str,
    /// MIME type.
    pub mime_type: &'a str,
    /// Annotations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<&'a ResourceAnnotations>,
    /// UI icons.
    #[serde(skip_serializing_if = "<[Icon]>::is_empty")]
    pub icons: &'a [Icon],
}

impl ResourceTemplate {
    /// Creates a templated resource.
    pub fn new<F>(
        uri_template: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&Variables) -> Result<String, ToolError> + 'static,
    {
        Self {
            uri_template: uri_template.into(),
            name: name.into(),
            description: description.into(),
            mime_type: mime_type.into(),
            annotations: None,
            icons: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Sets the annotations.
    #[must_use]
    pub fn annotations(mut self, annotations: ResourceAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Adds an icon.
    #[must_use]
    pub fn icon(mut self, icon: Icon) -> Self {
        self.icons.push(icon);
        self
    }

    /// Returns the resources/templates/list entry.
    #[must_use]
    pub fn definition(&self) -> ResourceTemplateDefinition<'_> {
        ResourceTemplateDefinition {
            uri_template: &self.uri_template,
            name: &self.name,
            description: &self.description,
            mime_type: &self.mime_type,
            annotations: self.annotations.as_ref(),
            icons: &self.icons,
        }
    }

    /// Names of the template's variables, in order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        segments(&self.uri_template)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|seg| match seg {
                Segment::Variable(name) => Some(name),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Matches a concrete URI against the template.
    ///
    /// A variable binds everything up to the next literal, or to the next
    /// `/` when directly followed by another variable, or the remainder of
    /// the URI when it ends the template. Empty bindings never match.
    #[must_use]
    pub fn match_uri(&self, uri: &str) -> Option<Variables> {
        let segs = segments(&self.uri_template)?;
        let mut vars = Variables::new();
        let mut rest = uri;

        for (i, seg) in segs.iter().enumerate() {
            match *seg {
                Segment::Literal(lit) => rest = rest.strip_prefix(lit)?,
                Segment::Variable(name) => {
                    let end = match segs.get(i + 1) {
                        Some(Segment::Literal(next)) => rest.find(next)?,
                        Some(Segment::Variable(_)) => rest.find('/').unwrap_or(rest.len()),
                        None => rest.len(),
                    };
                    if end == 0 {
                        return None;
                    }
                    vars.insert(name.to_string(), rest[..end].to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(vars)
    }

    /// Produces content for a concrete URI and its bound variables.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or [`ToolError::Failed`] if it panicked.
    pub fn read(&self, uri: &str, vars: &Variables) -> Result<ResourceContents, ToolError> {
        let text = guarded(&self.uri_template, || (self.handler)(vars))?;
        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: self.mime_type.clone(),
            text,
        })
    }
}

fn guarded(
    uri: &str,
    producer: impl FnOnce() -> Result<String, ToolError>,
) -> Result<String, ToolError> {
    catch_unwind(AssertUnwindSafe(producer)).unwrap_or_else(|_| {
        tracing::error!(uri, "Resource handler panicked");
        Err(ToolError::Failed("resource handler panicked".into()))
    })
}
