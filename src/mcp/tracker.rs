//! In-flight request tracking and cooperative cancellation.
//!
//! The tracker only records intent. A long-running handler must poll
//! [`RequestTracker::is_cancelled`] and stop on its own; nothing is
//! interrupted.

use std::collections::{HashMap, HashSet};

use crate::mcp::protocol::RequestId;

/// In-flight requests with optional progress tokens.
#[derive(Debug, Default)]
pub struct RequestTracker {
    in_flight: HashMap<RequestId, Option<String>>,
    cancelled: HashSet<RequestId>,
}

impl RequestTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request as in flight.
    pub fn track_request(&mut self, id: RequestId, progress_token: Option<String>) {
        self.cancelled.remove(&id);
        self.in_flight.insert(id, progress_token);
    }

    /// Marks a tracked request cancelled. Unknown IDs return `false` and
    /// leave no trace.
    pub fn cancel_request(&mut self, id: &RequestId) -> bool {
        if !self.in_flight.contains_key(id) {
            return false;
        }
        tracing::debug!(%id, "Request cancelled");
        self.cancelled.insert(id.clone());
        true
    }

    /// Removes a request, whether or not it was cancelled. Returns `true`
    /// if it had been cancelled, so callers can drop late side effects.
    pub fn complete_request(&mut self, id: &RequestId) -> bool {
        self.in_flight.remove(id);
        self.cancelled.remove(id)
    }

    /// Returns `true` if the request was cancelled and has not completed.
    #[must_use]
    pub fn is_cancelled(&self, id: &RequestId) -> bool {
        self.cancelled.contains(id)
    }

    /// Returns `true` if any request is in flight.
    #[must_use]
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Number of in-flight requests.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// The progress token a request was tracked with.
    #[must_use]
    pub fn progress_token(&self, id: &RequestId) -> Option<&str> {
        self.in_flight.get(id).and_then(Option::as_deref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_complete() {
        let mut t = RequestTracker::new();
        t.track_request(RequestId::from(1), Some("tok".into()));
        t.track_request(RequestId::from("abc"), None);
        assert!(t.has_in_flight());
        assert_eq!(t.in_flight_count(), 2);
        assert_eq!(t.progress_token(&RequestId::from(1)), Some("tok"));
        assert_eq!(t.progress_token(&RequestId::from("abc")), None);

        assert!(!t.complete_request(&RequestId::from(1)));
        assert!(!t.complete_request(&RequestId::from("abc")));
        assert!(!t.has_in_flight());
    }

    #[test]
    fn cancel_unknown_is_noop() {
        let mut t = RequestTracker::new();
        assert!(!t.cancel_request(&RequestId::from(42)));
        assert!(!t.is_cancelled(&RequestId::from(42)));
    }

    #[test]
    fn cancel_then_complete() {
        let mut t = RequestTracker::new();
        let id = RequestId::from(7);
        t.track_request(id.clone(), None);
        assert!(t.cancel_request(&id));
        assert!(t.is_cancelled(&id));
        assert_eq!(t.in_flight_count(), 1);

        assert!(t.complete_request(&id));
        assert!(!t.is_cancelled(&id));
        assert_eq!(t.in_flight_count(), 0);
    }
}
