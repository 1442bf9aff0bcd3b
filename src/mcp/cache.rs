//! Time-limited caching of `tools/call` results.
//!
//! Only tools given a TTL are cached, and only while the cache is enabled.
//! Entries are keyed by tool name and the serialised arguments, so identical
//! calls within the TTL skip the handler. Error results are never stored.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::mcp::content::ToolCallResult;

/// Default bound on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 32;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ToolCallResult,
    cached_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.cached_at) < self.ttl
    }
}

/// Per-tool TTL cache with a bounded number of entries.
#[derive(Debug, Clone)]
pub struct ToolResultCache {
    enabled: bool,
    max_entries: usize,
    ttls: IndexMap<String, Duration>,
    entries: IndexMap<(String, String), CacheEntry>,
    hits: u64,
    misses: u64,
}

impl Default for ToolResultCache {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: DEFAULT_MAX_ENTRIES,
            ttls: IndexMap::new(),
            entries: IndexMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl ToolResultCache {
    /// Creates a disabled, empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns caching on or off. Stored entries are kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns `true` if lookups and stores are active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets how long results of `tool` stay valid. A zero TTL stops caching
    /// the tool and drops its entries.
    pub fn set_tool_ttl(&mut self, tool: &str, ttl: Duration) {
        if ttl.is_zero() {
            self.ttls.shift_remove(tool);
            self.invalidate_tool(tool);
        } else {
            self.ttls.insert(tool.to_string(), ttl);
        }
    }

    /// TTL configured for `tool`, if any.
    #[must_use]
    pub fn tool_ttl(&self, tool: &str) -> Option<Duration> {
        self.ttls.get(tool).copied()
    }

    /// Bounds the number of stored entries. Zero is treated as one.
    pub fn set_max_entries(&mut self, max: usize) {
        self.max_entries = max.max(1);
        while self.entries.len() > self.max_entries {
            self.entries.shift_remove_index(0);
        }
    }

    /// Current entry bound.
    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Looks up a fresh result for `tool` called with `arguments`.
    pub fn get(&mut self, tool: &str, arguments: &Value) -> Option<ToolCallResult> {
        self.get_at(tool, arguments, Instant::now())
    }

    /// [`Self::get`] against an explicit clock.
    pub fn get_at(&mut self, tool: &str, arguments: &Value, now: Instant) -> Option<ToolCallResult> {
        if !self.enabled || !self.ttls.contains_key(tool) {
            return None;
        }

        let key = (tool.to_string(), arguments.to_string());
        match self.entries.get(&key) {
            Some(entry) if entry.is_fresh(now) => {
                self.hits += 1;
                tracing::debug!(tool, "Tool cache hit");
                Some(entry.result.clone())
            }
            Some(_) => {
                self.entries.shift_remove(&key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a result if the tool has a TTL and the result is not an error.
    pub fn put(&mut self, tool: &str, arguments: &Value, result: &ToolCallResult) {
        self.put_at(tool, arguments, result, Instant::now());
    }

    /// [`Self::put`] against an explicit clock.
    pub fn put_at(&mut self, tool: &str, arguments: &Value, result: &ToolCallResult, now: Instant) {
        if !self.enabled || result.is_error {
            return;
        }
        let Some(ttl) = self.tool_ttl(tool) else {
            return;
        };

        let key = (tool.to_string(), arguments.to_string());
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.entries.retain(|_, e| e.is_fresh(now));
            if self.entries.len() >= self.max_entries {
                // Oldest insertion first
                self.entries.shift_remove_index(0);
            }
        }

        self.entries.shift_remove(&key);
        self.entries.insert(
            key,
            CacheEntry {
                result: result.clone(),
                cached_at: now,
                ttl,
            },
        );
    }

    /// Drops every entry for `tool`.
    pub fn invalidate_tool(&mut self, tool: &str) {
        self.entries.retain(|(name, _), _| name != tool);
    }

    /// Drops the entry for one call.
    pub fn invalidate(&mut self, tool: &str, arguments: &Value) {
        self.entries
            .shift_remove(&(tool.to_string(), arguments.to_string()));
    }

    /// Drops all entries and zeroes the statistics.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups for cached tools that found nothing fresh.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Fraction of lookups that hit; zero before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Diagnostic snapshot.
    #[must_use]
    pub fn stats(&self) -> Value {
        json!({
            "enabled": self.enabled,
            "entries": self.entries.len(),
            "maxEntries": self.max_entries,
            "hits": self.hits,
            "misses": self.misses,
            "hitRate": self.hit_rate(),
            "toolCount": self.ttls.len(),
        })
    }
}
