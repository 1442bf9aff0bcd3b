//! Server-initiated requests and their pending replies.
//!
//! The server can ask the connected client to do work (run a model, collect
//! input from a human). Each request gets an ID, either from the manager's
//! own counter (which starts well above typical client IDs) or from a
//! counter the caller shares across managers, is serialized into an outgoing queue for
//! the transport, and waits in a pending table until the client replies.
//!
//! Lifecycle of one entry: queued, drained by the transport, pending, then
//! resolved exactly once. Unanswered entries stay pending until
//! [`OutboundRequests::prune_expired`] is called.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde_json::{json, Value};

/// A request type the server can send to the client.
pub trait ServerRequest {
    /// JSON-RPC method name.
    const METHOD: &'static str;
    /// First ID allocated by a fresh manager.
    const FIRST_ID: i64;
    /// Parsed reply handed to the callback.
    type Response;

    /// Request parameters.
    fn params(&self) -> Value;

    /// Parses a `result` reply.
    fn parse_response(result: &Value) -> Self::Response;

    /// Builds the response delivered when the client replies with `error`.
    fn error_response(error: &Value) -> Self::Response;
}

/// Continuation invoked with the client's reply.
pub type ResponseCallback<T> = Box<dyn FnOnce(T)>;

struct Pending<T> {
    callback: ResponseCallback<T>,
    sent_at: Instant,
}

/// Pending-request table and outgoing queue for one request type.
pub struct OutboundRequests<R: ServerRequest> {
    pending: IndexMap<i64, Pending<R::Response>>,
    outgoing: VecDeque<String>,
    next_id: i64,
    _request: PhantomData<R>,
}

impl<R: ServerRequest> Default for OutboundRequests<R> {
    fn default() -> Self {
        Self {
            pending: IndexMap::new(),
            outgoing: VecDeque::new(),
            next_id: R::FIRST_ID,
            _request: PhantomData,
        }
    }
}

impl<R: ServerRequest> std::fmt::Debug for OutboundRequests<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequests")
            .field("method", &R::METHOD)
            .field("pending", &self.pending.len())
            .field("outgoing", &self.outgoing.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<R: ServerRequest> OutboundRequests<R> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a request and returns its allocated ID.
    pub fn queue_request<F>(&mut self, request: &R, callback: F) -> i64
    where
        F: FnOnce(R::Response) + 'static,
    {
        self.queue_request_at(request, callback, Instant::now())
    }

    /// Queues a request with an explicit send time.
    pub fn queue_request_at<F>(&mut self, request: &R, callback: F, now: Instant) -> i64
    where
        F: FnOnce(R::Response) + 'static,
    {
        let id = self.next_id;
        self.queue_request_with_id_at(id, request, callback, now)
    }

    /// Queues a request under an ID allocated by the caller. Used when
    /// several managers share one ID space so replies cannot be misrouted.
    /// Later self-allocated IDs continue above `id`.
    pub fn queue_request_with_id<F>(&mut self, id: i64, request: &R, callback: F) -> i64
    where
        F: FnOnce(R::Response) + 'static,
    {
        self.queue_request_with_id_at(id, request, callback, Instant::now())
    }

    /// [`Self::queue_request_with_id`] with an explicit send time.
    pub fn queue_request_with_id_at<F>(
        &mut self,
        id: i64,
        request: &R,
        callback: F,
        now: Instant,
    ) -> i64
    where
        F: FnOnce(R::Response) + 'static,
    {
        self.next_id = self.next_id.max(id.saturating_add(1));

        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": R::METHOD,
            "params": request.params(),
        });
        self.outgoing.push_back(message.to_string());
        self.pending.insert(
            id,
            Pending {
                callback: Box::new(callback),
                sent_at: now,
            },
        );

        tracing::debug!(method = R::METHOD, id, "Queued server request");
        id
    }

    /// Removes and returns all serialized requests not yet sent.
    pub fn drain_outgoing(&mut self) -> Vec<String> {
        self.outgoing.drain(..).collect()
    }

    /// Resolves a pending request with a `result` reply. Returns `false`
    /// if no request with this ID is pending.
    pub fn handle_response(&mut self, id: i64, result: &Value) -> bool {
        self.resolve(id, || R::parse_response(result))
    }

    /// Resolves a pending request with an `error` reply.
    pub fn handle_error(&mut self, id: i64, error: &Value) -> bool {
        self.resolve(id, || R::error_response(error))
    }

    fn resolve(&mut self, id: i64, parse: impl FnOnce() -> R::Response) -> bool {
        let Some(pending) = self.pending.shift_remove(&id) else {
            return false;
        };
        let response = parse();
        if catch_unwind(AssertUnwindSafe(|| (pending.callback)(response))).is_err() {
            tracing::error!(method = R::METHOD, id, "Response callback panicked");
        }
        true
    }

    /// Returns `true` if any request awaits a reply.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drops pending requests older than `timeout` without invoking their
    /// callbacks. Returns how many were dropped.
    pub fn prune_expired(&mut self, timeout: Duration) -> usize {
        self.prune_expired_at(Instant::now(), timeout)
    }

    /// [`Self::prune_expired`] against an explicit clock.
    pub fn prune_expired_at(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, p| now.saturating_duration_since(p.sent_at) <= timeout);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            tracing::warn!(method = R::METHOD, dropped, "Expired unanswered server requests");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Echo;

    impl ServerRequest for Echo {
        const METHOD: &'static str = "test/echo";
        const FIRST_ID: i64 = 500;
        type Response = Option<Value>;

        fn params(&self) -> Value {
            json!({"hello": "world"})
        }

        fn parse_response(result: &Value) -> Self::Response {
            Some(result.clone())
        }

        fn error_response(_error: &Value) -> Self::Response {
            None
        }
    }

    #[test]
    fn ids_increase_from_base() {
        let mut mgr = OutboundRequests::<Echo>::new();
        assert_eq!(mgr.queue_request(&Echo, |_| {}), 500);
        assert_eq!(mgr.queue_request(&Echo, |_| {}), 501);
        assert_eq!(mgr.pending_count(), 2);
    }

    #[test]
    fn caller_allocated_ids_advance_counter() {
        let mut mgr = OutboundRequests::<Echo>::new();
        assert_eq!(mgr.queue_request_with_id(9000, &Echo, |_| {}), 9000);
        assert_eq!(mgr.queue_request(&Echo, |_| {}), 9001);
        // A lower explicit ID does not move the counter back
        assert_eq!(mgr.queue_request_with_id(42, &Echo, |_| {}), 42);
        assert_eq!(mgr.queue_request(&Echo, |_| {}), 9002);

        let ids: Vec<i64> = mgr
            .drain_outgoing()
            .iter()
            .map(|m| serde_json::from_str::<Value>(m).unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [9000, 9001, 42, 9002]);
        assert!(mgr.handle_response(42, &json!({})));
    }

    #[test]
    fn drain_returns_each_message_once() {
        let mut mgr = OutboundRequests::<Echo>::new();
        mgr.queue_request(&Echo, |_| {});
        let out = mgr.drain_outgoing();
        assert_eq!(out.len(), 1);
        let msg: Value = serde_json::from_str(&out[0]).unwrap();
        assert_eq!(msg["method"], json!("test/echo"));
        assert_eq!(msg["id"], json!(500));
        assert_eq!(msg["params"], json!({"hello": "world"}));
        assert!(mgr.drain_outgoing().is_empty());
    }

    #[test]
    fn response_invokes_callback_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = OutboundRequests::<Echo>::new();
        let sink = Rc::clone(&seen);
        let id = mgr.queue_request(&Echo, move |r| sink.borrow_mut().push(r));

        assert!(!mgr.handle_response(id + 1, &json!({})));
        assert!(seen.borrow().is_empty());

        assert!(mgr.handle_response(id, &json!({"ok": true})));
        assert!(!mgr.handle_response(id, &json!({"ok": true})));
        assert_eq!(*seen.borrow(), vec![Some(json!({"ok": true}))]);
        assert!(!mgr.has_pending());
    }

    #[test]
    fn error_reply_resolves_with_error_response() {
        let seen = Rc::new(RefCell::new(None));
        let mut mgr = OutboundRequests::<Echo>::new();
        let sink = Rc::clone(&seen);
        let id = mgr.queue_request(&Echo, move |r| *sink.borrow_mut() = Some(r));
        assert!(mgr.handle_error(id, &json!({"code": -1, "message": "no"})));
        assert_eq!(*seen.borrow(), Some(None));
    }

    #[test]
    fn panicking_callback_is_contained() {
        let mut mgr = OutboundRequests::<Echo>::new();
        let id = mgr.queue_request(&Echo, |_| panic!("callback bug"));
        assert!(mgr.handle_response(id, &json!({})));
        assert!(!mgr.has_pending());
    }

    #[test]
    fn prune_drops_only_old_entries() {
        let mut mgr = OutboundRequests::<Echo>::new();
        let start = Instant::now();
        let called = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&called);
        let old = mgr.queue_request_at(&Echo, move |_| *flag.borrow_mut() = true, start);
        let fresh = mgr.queue_request_at(&Echo, |_| {}, start + Duration::from_secs(50));

        let dropped = mgr.prune_expired_at(start + Duration::from_secs(61), Duration::from_secs(60));
        assert_eq!(dropped, 1);
        assert!(!mgr.handle_response(old, &json!({})));
        assert!(!*called.borrow());
        assert!(mgr.handle_response(fresh, &json!({})));
    }
}
