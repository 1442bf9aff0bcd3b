//! Resource subscriptions and the pending outbound notification queue.
//!
//! Notifications are buffered here and drained by the transport after each
//! processing cycle, in the order they were queued.

use std::collections::VecDeque;

use indexmap::IndexSet;
use serde_json::json;

use crate::mcp::protocol::OutgoingNotification;

/// Catalogs whose contents can change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// tools/list
    Tools,
    /// resources/list and resources/templates/list
    Resources,
    /// prompts/list
    Prompts,
}

impl ListKind {
    const fn method(self) -> &'static str {
        match self {
            Self::Tools => "notifications/tools/list_changed",
            Self::Resources => "notifications/resources/list_changed",
            Self::Prompts => "notifications/prompts/list_changed",
        }
    }
}

/// Subscription set plus FIFO notification queue.
#[derive(Debug, Default)]
pub struct Notifier {
    subscriptions: IndexSet<String>,
    pending: VecDeque<OutgoingNotification>,
}

impl Notifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a URI. Returns `false` if already subscribed.
    pub fn subscribe(&mut self, uri: &str) -> bool {
        self.subscriptions.insert(uri.to_string())
    }

    /// Unsubscribes from a URI. Returns `false` if not subscribed.
    pub fn unsubscribe(&mut self, uri: &str) -> bool {
        self.subscriptions.shift_remove(uri)
    }

    /// Returns `true` if the URI has a subscriber.
    #[must_use]
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions.contains(uri)
    }

    /// Number of subscribed URIs.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Queues `notifications/resources/updated` if `uri` is subscribed.
    /// Returns whether a notification was queued.
    pub fn notify_resource_updated(&mut self, uri: &str) -> bool {
        if !self.is_subscribed(uri) {
            return false;
        }
        self.push(OutgoingNotification::new(
            "notifications/resources/updated",
            Some(json!({ "uri": uri })),
        ));
        true
    }

    /// Queues a `list_changed` notification.
    pub fn notify_list_changed(&mut self, kind: ListKind) {
        self.push(OutgoingNotification::new(kind.method(), None));
    }

    /// Queues an arbitrary notification.
    pub fn push(&mut self, notification: OutgoingNotification) {
        tracing::debug!(method = %notification.method, "Queueing notification");
        self.pending.push_back(notification);
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes and returns all queued notifications as JSON lines.
    pub fn drain(&mut self) -> Vec<String> {
        self.pending.drain(..).map(|n| n.to_line()).collect()
    }
}
