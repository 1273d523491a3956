//! Session state: the append-only rendered history of each session.
//!
//! Dispatch handlers append a [`SessionMessage`] after each successful
//! render; history replay reads them back in order. Sessions are opened on
//! first use, touched on every append, and closed explicitly or by
//! [`SessionStore::evict_idle`].

use chrono::{DateTime, Utc};
use genbi_core::session::SessionMessage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// One session's rendered history.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<SessionMessage>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            messages: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }
}

/// Store of per-session message logs.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions idle longer than `timeout` are closed by [`evict_idle`](Self::evict_idle).
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Open `id` if it is not open yet. Returns whether it was created.
    pub async fn open(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return false;
        }
        sessions.insert(id.to_string(), Session::new(id));
        debug!(session_id = %id, "Opened session");
        true
    }

    /// Append a rendered message, opening the session if needed.
    pub async fn append(&self, id: &str, message: SessionMessage) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id));
        session.last_active = Utc::now();
        session.messages.push(message);
    }

    /// Mark `id` as active now.
    pub async fn touch(&self, id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.last_active = Utc::now();
        }
    }

    /// The rendered history of `id`, oldest first. Empty for unknown sessions.
    pub async fn history(&self, id: &str) -> Vec<SessionMessage> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Close `id`, returning its final state.
    pub async fn close(&self, id: &str) -> Option<Session> {
        let closed = self.sessions.write().await.remove(id);
        if closed.is_some() {
            debug!(session_id = %id, "Closed session");
        }
        closed
    }

    /// Close every session idle since before `now - idle_timeout`.
    ///
    /// Returns the ids closed. Does nothing without an idle timeout.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let Some(timeout) = self.idle_timeout else {
            return Vec::new();
        };
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return Vec::new();
        };

        let mut sessions = self.sessions.write().await;
        let idle: Vec<String> = sessions
            .values()
            .filter(|s| now - s.last_active >= timeout)
            .map(|s| s.id.clone())
            .collect();
        for id in &idle {
            sessions.remove(id);
            debug!(session_id = %id, "Evicted idle session");
        }
        idle
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
