//! Named tool groups that can be switched on and off together.
//!
//! A tool may belong to several groups. It is hidden only when every group
//! it belongs to is disabled; ungrouped tools are always visible.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// A set of tool names sharing an enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolGroup {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub enabled: bool,
    pub tools: IndexSet<String>,
}

impl ToolGroup {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            enabled: true,
            tools: IndexSet::new(),
        }
    }
}

/// All groups plus a reverse index from tool name to group names.
#[derive(Debug, Clone, Default)]
pub struct ToolGroups {
    groups: IndexMap<String, ToolGroup>,
    memberships: IndexMap<String, IndexSet<String>>,
}

impl ToolGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an enabled, empty group. Returns `false` if the name is taken.
    pub fn create_group(&mut self, name: &str, description: &str) -> bool {
        if self.groups.contains_key(name) {
            return false;
        }
        self.groups
            .insert(name.to_string(), ToolGroup::new(name, description));
        true
    }

    /// Removes a group and its memberships.
    pub fn remove_group(&mut self, name: &str) -> bool {
        let Some(group) = self.groups.shift_remove(name) else {
            return false;
        };
        for tool in &group.tools {
            self.unlink(tool, name);
        }
        true
    }

    /// Adds `tool` to `group`, creating the group if needed. Returns `false`
    /// if the tool was already a member.
    pub fn add_tool(&mut self, group: &str, tool: &str) -> bool {
        let entry = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| ToolGroup::new(group, ""));
        if !entry.tools.insert(tool.to_string()) {
            return false;
        }
        self.memberships
            .entry(tool.to_string())
            .or_default()
            .insert(group.to_string());
        true
    }

    pub fn remove_tool(&mut self, group: &str, tool: &str) -> bool {
        let removed = self
            .groups
            .get_mut(group)
            .is_some_and(|g| g.tools.shift_remove(tool));
        if removed {
            self.unlink(tool, group);
        }
        removed
    }

    /// Drops `tool` from every group, e.g. after it is unregistered.
    pub fn forget_tool(&mut self, tool: &str) {
        if let Some(groups) = self.memberships.shift_remove(tool) {
            for name in &groups {
                if let Some(group) = self.groups.get_mut(name) {
                    group.tools.shift_remove(tool);
                }
            }
        }
    }

    fn unlink(&mut self, tool: &str, group: &str) {
        if let Some(set) = self.memberships.get_mut(tool) {
            set.shift_remove(group);
            if set.is_empty() {
                self.memberships.shift_remove(tool);
            }
        }
    }

    /// Sets the enabled flag. Returns `true` only if the flag changed.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.groups.get_mut(name) {
            Some(group) if group.enabled != enabled => {
                group.enabled = enabled;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_group_enabled(&self, name: &str) -> bool {
        self.groups.get(name).is_some_and(|g| g.enabled)
    }

    #[must_use]
    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Returns `true` if `tool` belongs to at least one group and all of
    /// them are disabled.
    #[must_use]
    pub fn is_tool_disabled(&self, tool: &str) -> bool {
        self.memberships.get(tool).is_some_and(|groups| {
            !groups.is_empty() && groups.iter().all(|g| !self.is_group_enabled(g))
        })
    }

    #[must_use]
    pub fn tools_in_group(&self, name: &str) -> Vec<&str> {
        self.groups
            .get(name)
            .map(|g| g.tools.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn groups_for_tool(&self, tool: &str) -> Vec<&str> {
        self.memberships
            .get(tool)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ToolGroup> {
        self.groups.get(name)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in creation order, serialised as an array.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.groups.values().collect::<Vec<_>>())
            .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    }
}
