//! Client session tracking with a capacity cap and idle expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::SessionError;

/// Default maximum number of concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 4;

/// Default idle timeout (30 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque identifier (32 hex digits).
    pub id: String,
    /// Name the client reported in `initialize`.
    pub client_name: String,
    /// Set once the handshake created the session.
    pub initialized: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last validated use.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(client_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            client_name: client_name.to_string(),
            initialized: true,
            created_at: now,
            last_activity: now,
        }
    }

    /// Time since the last activity, as of `now`.
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or_default()
    }
}

/// Active sessions keyed by ID.
#[derive(Debug)]
pub struct SessionManager {
    sessions: IndexMap<String, Session>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            sessions: IndexMap::new(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl SessionManager {
    /// Creates a manager with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum concurrent sessions; 0 means unlimited.
    #[must_use]
    pub const fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Sets the maximum; 0 means unlimited. Existing sessions are kept.
    pub fn set_max_sessions(&mut self, max: usize) {
        self.max_sessions = max;
    }

    /// Idle timeout; zero disables expiry.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Sets the idle timeout; zero disables expiry.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Opens a session and returns its ID.
    ///
    /// Idle sessions are swept first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CapacityReached`] if the cap is still full.
    /// Existing sessions are never evicted to make room.
    pub fn create_session(&mut self, client_name: &str) -> Result<String, SessionError> {
        self.create_session_at(client_name, Utc::now())
    }

    /// [`Self::create_session`] against an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CapacityReached`] if the cap is full.
    pub fn create_session_at(&mut self, client_name: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        self.prune_idle_at(now);

        if self.max_sessions > 0 && self.sessions.len() >= self.max_sessions {
            tracing::warn!(max = self.max_sessions, client = client_name, "Session limit reached");
            return Err(SessionError::CapacityReached {
                max: self.max_sessions,
            });
        }

        let session = Session::new(client_name, now);
        let id = session.id.clone();
        tracing::debug!(%id, client = client_name, "Session created");
        self.sessions.insert(id.clone(), session);
        Ok(id)
    }

    /// Returns `true` if the session exists, and records activity on it.
    pub fn validate_session(&mut self, id: &str) -> bool {
        self.validate_session_at(id, Utc::now())
    }

    /// [`Self::validate_session`] against an explicit clock.
    pub fn validate_session_at(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.last_activity = now;
                true
            }
            None => false,
        }
    }

    /// Ends a session. Returns `true` if it existed.
    pub fn remove_session(&mut self, id: &str) -> bool {
        self.sessions.shift_remove(id).is_some()
    }

    /// Looks up a session.
    #[must_use]
    pub fn get_session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Removes sessions idle longer than the timeout. Returns how many.
    pub fn prune_idle(&mut self) -> usize {
        self.prune_idle_at(Utc::now())
    }

    /// [`Self::prune_idle`] against an explicit clock.
    pub fn prune_idle_at(&mut self, now: DateTime<Utc>) -> usize {
        if self.idle_timeout.is_zero() {
            return 0;
        }
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.idle_for(now) <= timeout);
        let pruned = before - self.sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Expired idle sessions");
        }
        pruned
    }

    /// Diagnostic snapshot of all sessions.
    #[must_use]
    pub fn summary(&self) -> Value {
        let now = Utc::now();
        let sessions: Vec<Value> = self
            .sessions
            .values()
            .map(|s| {
                json!({
                    "id": s.id,
                    "clientName": s.client_name,
                    "createdAt": s.created_at.to_rfc3339(),
                    "idleSecs": s.idle_for(now).as_secs(),
                })
            })
            .collect();

        json!({
            "activeSessions": self.sessions.len(),
            "maxSessions": self.max_sessions,
            "idleTimeoutSecs": self.idle_timeout.as_secs(),
            "sessions": sessions,
        })
    }
}
