//! Argument autocompletion for completion/complete.

use indexmap::IndexMap;
use serde::Serialize;

/// Maximum number of values returned in one completion.
pub const MAX_COMPLETION_VALUES: usize = 100;

/// Produces candidates for one argument given the partial value typed so
/// far. The manager applies prefix filtering afterwards.
pub type CompletionProvider = Box<dyn Fn(&str) -> Vec<String>>;

/// What a completion reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// `ref/prompt`, identified by prompt name.
    Prompt,
    /// `ref/resource`, identified by template URI.
    Resource,
}

impl RefKind {
    /// Parses the wire `type` of a reference.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "ref/prompt" => Some(Self::Prompt),
            "ref/resource" => Some(Self::Resource),
            _ => None,
        }
    }
}

/// The `completion` object of a completion/complete result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Matching values, at most [`MAX_COMPLETION_VALUES`].
    pub values: Vec<String>,
    /// Total number of matches before truncation.
    pub total: usize,
    /// Whether matches were dropped.
    pub has_more: bool,
}

type Key = (RefKind, String, String);

/// Completion providers keyed by reference and argument name.
#[derive(Default)]
pub struct CompletionManager {
    providers: IndexMap<Key, CompletionProvider>,
}

impl std::fmt::Debug for CompletionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionManager")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl CompletionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider. Replaces any existing provider for the key.
    pub fn add_provider<F>(
        &mut self,
        kind: RefKind,
        reference: impl Into<String>,
        argument: impl Into<String>,
        provider: F,
    ) where
        F: Fn(&str) -> Vec<String> + 'static,
    {
        self.providers
            .insert((kind, reference.into(), argument.into()), Box::new(provider));
    }

    /// Registers a fixed candidate list.
    pub fn add_values(
        &mut self,
        kind: RefKind,
        reference: impl Into<String>,
        argument: impl Into<String>,
        values: Vec<String>,
    ) {
        self.add_provider(kind, reference, argument, move |_| values.clone());
    }

    /// Returns `true` if any provider is registered.
    #[must_use]
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Completes `partial` for the given argument. Matching is a
    /// case-sensitive prefix test; an empty partial matches everything.
    /// An unknown key yields an empty completion.
    #[must_use]
    pub fn complete(&self, kind: RefKind, reference: &str, argument: &str, partial: &str) -> Completion {
        let key = (kind, reference.to_string(), argument.to_string());
        let Some(provider) = self.providers.get(&key) else {
            return Completion::default();
        };

        let mut values: Vec<String> = provider(partial)
            .into_iter()
            .filter(|v| v.starts_with(partial))
            .collect();
        let total = values.len();
        values.truncate(MAX_COMPLETION_VALUES);

        Completion {
            has_more: total > values.len(),
            values,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CompletionManager {
        let mut mgr = CompletionManager::new();
        mgr.add_values(
            RefKind::Prompt,
            "diagnose",
            "sensor",
            vec!["temp1".into(), "temp2".into(), "Humidity".into(), "tilt".into()],
        );
        mgr
    }

    #[test]
    fn ref_kind_parsing() {
        assert_eq!(RefKind::parse("ref/prompt"), Some(RefKind::Prompt));
        assert_eq!(RefKind::parse("ref/resource"), Some(RefKind::Resource));
        assert_eq!(RefKind::parse("ref/tool"), None);
    }

    #[test]
    fn prefix_filter_is_case_sensitive() {
        let mgr = manager();
        let c = mgr.complete(RefKind::Prompt, "diagnose", "sensor", "te");
        assert_eq!(c.values, ["temp1", "temp2"]);
        assert_eq!(c.total, 2);
        assert!(!c.has_more);

        assert!(mgr.complete(RefKind::Prompt, "diagnose", "sensor", "h").values.is_empty());
    }

    #[test]
    fn empty_partial_returns_all() {
        let c = manager().complete(RefKind::Prompt, "diagnose", "sensor", "");
        assert_eq!(c.values.len(), 4);
    }

    #[test]
    fn unknown_key_is_empty() {
        let mgr = manager();
        assert_eq!(mgr.complete(RefKind::Resource, "diagnose", "sensor", ""), Completion::default());
        assert_eq!(mgr.complete(RefKind::Prompt, "diagnose", "other", ""), Completion::default());
    }

    #[test]
    fn results_are_capped() {
        let mut mgr = CompletionManager::new();
        mgr.add_provider(RefKind::Resource, "pin://{n}", "n", |_| {
            (0..150).map(|n| n.to_string()).collect()
        });
        let c = mgr.complete(RefKind::Resource, "pin://{n}", "n", "");
        assert_eq!(c.values.len(), MAX_COMPLETION_VALUES);
        assert_eq!(c.total, 150);
        assert!(c.has_more);
    }
}
