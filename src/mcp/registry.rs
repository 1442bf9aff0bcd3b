//! In-memory catalogs of tools, resources, templates, prompts and roots.
//!
//! Every catalog preserves registration order for listing. Registering an
//! existing key replaces the entry in place.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ToolError;
use crate::mcp::prompt::Prompt;
use crate::mcp::resource::{Resource, ResourceContents, ResourceTemplate, Variables};
use crate::mcp::tool::Tool;

/// A filesystem or device root exposed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Root {
    /// Root URI, e.g. `file:///sd`.
    pub uri: String,
    /// Display name.
    pub name: String,
}

/// The resolved target of a resources/read.
#[derive(Debug)]
pub enum ResourceMatch<'a> {
    /// An exact static URI.
    Static(&'a Resource),
    /// A template with its bound variables.
    Template(&'a ResourceTemplate, Variables),
}

impl ResourceMatch<'_> {
    /// Produces the content for `uri`.
    ///
    /// # Errors
    ///
    /// Returns the resource handler's error.
    pub fn read(&self, uri: &str) -> Result<ResourceContents, ToolError> {
        match self {
            Self::Static(resource) => resource.read(),
            Self::Template(template, vars) => template.read(uri, vars),
        }
    }
}

/// Ordered catalogs owned by one server instance.
#[derive(Debug, Default)]
pub struct Registry {
    tools: IndexMap<String, Tool>,
    resources: IndexMap<String, Resource>,
    templates: IndexMap<String, ResourceTemplate>,
    prompts: IndexMap<String, Prompt>,
    roots: IndexMap<String, Root>,
}

impl Registry {
    /// Creates empty catalogs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    pub fn add_tool(&mut self, tool: Tool) {
        tracing::debug!(name = %tool.name, "Registering tool");
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Removes a tool. Returns `true` if it existed.
    pub fn remove_tool(&mut self, name: &str) -> bool {
        self.tools.shift_remove(name).is_some()
    }

    /// Looks up a tool.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Tools in registration order.
    #[must_use]
    pub fn tools(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    /// Registers a static resource.
    pub fn add_resource(&mut self, resource: Resource) {
        tracing::debug!(uri = %resource.uri, "Registering resource");
        self.resources.insert(resource.uri.clone(), resource);
    }

    /// Removes a static resource. Returns `true` if it existed.
    pub fn remove_resource(&mut self, uri: &str) -> bool {
        self.resources.shift_remove(uri).is_some()
    }

    /// Static resources in registration order.
    #[must_use]
    pub fn resources(&self) -> Vec<&Resource> {
        self.resources.values().collect()
    }

    /// Registers a resource template, keyed by its URI template.
    pub fn add_template(&mut self, template: ResourceTemplate) {
        tracing::debug!(template = %template.uri_template, "Registering resource template");
        self.templates.insert(template.uri_template.clone(), template);
    }

    /// Removes a resource template. Returns `true` if it existed.
    pub fn remove_template(&mut self, uri_template: &str) -> bool {
        self.templates.shift_remove(uri_template).is_some()
    }

    /// Templates in registration order.
    #[must_use]
    pub fn templates(&self) -> Vec<&ResourceTemplate> {
        self.templates.values().collect()
    }

    /// Resolves a URI: an exact static match first, then the first
    /// template (in registration order) that matches.
    #[must_use]
    pub fn find_resource(&self, uri: &str) -> Option<ResourceMatch<'_>> {
        if let Some(resource) = self.resources.get(uri) {
            return Some(ResourceMatch::Static(resource));
        }
        self.templates
            .values()
            .find_map(|t| t.match_uri(uri).map(|vars| ResourceMatch::Template(t, vars)))
    }

    /// Registers a prompt.
    pub fn add_prompt(&mut self, prompt: Prompt) {
        tracing::debug!(name = %prompt.name, "Registering prompt");
        self.prompts.insert(prompt.name.clone(), prompt);
    }

    /// Removes a prompt. Returns `true` if it existed.
    pub fn remove_prompt(&mut self, name: &str) -> bool {
        self.prompts.shift_remove(name).is_some()
    }

    /// Looks up a prompt.
    #[must_use]
    pub fn prompt(&self, name: &str) -> Option<&Prompt> {
        self.prompts.get(name)
    }

    /// Prompts in registration order.
    #[must_use]
    pub fn prompts(&self) -> Vec<&Prompt> {
        self.prompts.values().collect()
    }

    /// Registers a root.
    pub fn add_root(&mut self, uri: impl Into<String>, name: impl Into<String>) {
        let root = Root {
            uri: uri.into(),
            name: name.into(),
        };
        self.roots.insert(root.uri.clone(), root);
    }

    /// Removes a root. Returns `true` if it existed.
    pub fn remove_root(&mut self, uri: &str) -> bool {
        self.roots.shift_remove(uri).is_some()
    }

    /// Roots in registration order.
    #[must_use]
    pub fn roots(&self) -> Vec<&Root> {
        self.roots.values().collect()
    }

    /// Returns `true` if any tools are registered.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Returns `true` if any static resources or templates are registered.
    #[must_use]
    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty() || !self.templates.is_empty()
    }

    /// Returns `true` if any prompts are registered.
    #[must_use]
    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }

    /// Returns `true` if any roots are registered.
    #[must_use]
    pub fn has_roots(&self) -> bool {
        !self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> Tool {
        Tool::new(name, "test", json!({"type": "object"}), |_| Ok(String::new()))
    }

    #[test]
    fn tools_keep_registration_order() {
        let mut reg = Registry::new();
        reg.add_tool(tool("b"));
        reg.add_tool(tool("a"));
        reg.add_tool(tool("c"));
        let names: Vec<_> = reg.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn re_adding_replaces_in_place() {
        let mut reg = Registry::new();
        reg.add_tool(tool("a"));
        reg.add_tool(tool("b"));
        reg.add_tool(Tool::new("a", "replaced", json!({}), |_| Ok(String::new())));
        assert_eq!(reg.tools().len(), 2);
        assert_eq!(reg.tools()[0].description, "replaced");
    }

    #[test]
    fn remove_reports_existence() {
        let mut reg = Registry::new();
        reg.add_tool(tool("a"));
        reg.add_tool(tool("b"));
        reg.add_tool(tool("c"));
        assert!(reg.remove_tool("b"));
        assert!(!reg.remove_tool("b"));
        let names: Vec<_> = reg.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn exact_resource_wins_over_template() {
        let mut reg = Registry::new();
        reg.add_template(ResourceTemplate::new("sensor://{id}", "t", "", "text/plain", |v| {
            Ok(format!("template {}", v["id"]))
        }));
        reg.add_resource(Resource::new("sensor://all", "all", "", "text/plain", || {
            Ok("static".into())
        }));

        let exact = reg.find_resource("sensor://all").unwrap();
        assert_eq!(exact.read("sensor://all").unwrap().text, "static");

        let templated = reg.find_resource("sensor://t1").unwrap();
        assert_eq!(templated.read("sensor://t1").unwrap().text, "template t1");

        assert!(reg.find_resource("other://x").is_none());
    }

    #[test]
    fn first_matching_template_wins() {
        let mut reg = Registry::new();
        reg.add_template(ResourceTemplate::new("dev://{a}", "first", "", "text/plain", |_| {
            Ok("first".into())
        }));
        reg.add_template(ResourceTemplate::new("dev://{b}", "second", "", "text/plain", |_| {
            Ok("second".into())
        }));
        let found = reg.find_resource("dev://x").unwrap();
        assert_eq!(found.read("dev://x").unwrap().text, "first");
    }

    #[test]
    fn roots_and_capability_flags() {
        let mut reg = Registry::new();
        assert!(!reg.has_roots() && !reg.has_tools() && !reg.has_resources() && !reg.has_prompts());
        reg.add_root("file:///sd", "SD card");
        assert!(reg.has_roots());
        assert_eq!(reg.roots()[0].name, "SD card");
        assert!(reg.remove_root("file:///sd"));
        assert!(!reg.has_roots());
    }
}
