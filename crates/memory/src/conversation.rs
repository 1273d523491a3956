//! Session-keyed conversational memory.
//!
//! Each session owns one [`Conversation`] behind its own mutex. The
//! reasoning loop holds that mutex for a whole turn, which serializes
//! turns within a session while letting different sessions run at once.

use genbi_core::message::Conversation;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one session's conversation.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

#[derive(Default)]
pub struct ConversationMemory {
    sessions: RwLock<HashMap<String, ConversationHandle>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the handle for `session_id`, creating an empty conversation on first use.
    pub async fn handle(&self, session_id: &str) -> ConversationHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return Arc::clone(handle);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(session_id)))),
        )
    }

    /// A copy of the conversation, if the session has one.
    pub async fn snapshot(&self, session_id: &str) -> Option<Conversation> {
        let handle = self.sessions.read().await.get(session_id).cloned()?;
        let conversation = handle.lock().await;
        Some(conversation.clone())
    }

    /// Drop the conversation for `session_id`. Returns whether one existed.
    pub async fn forget(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genbi_core::message::Message;

    #[tokio::test]
    async fn handle_is_shared_per_session() {
        let memory = ConversationMemory::new();
        let a = memory.handle("s1").await;
        a.lock().await.push(Message::user("Who are the top employees?"));

        let b = memory.handle("s1").await;
        assert_eq!(b.lock().await.messages.len(), 1);
        assert_eq!(memory.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let memory = ConversationMemory::new();
        memory
            .handle("s1")
            .await
            .lock()
            .await
            .push(Message::user("one"));
        let other = memory.handle("s2").await;
        assert!(other.lock().await.messages.is_empty());
        assert_eq!(other.lock().await.session_id, "s2");
    }

    #[tokio::test]
    async fn forget_drops_history() {
        let memory = ConversationMemory::new();
        memory
            .handle("s1")
            .await
            .lock()
            .await
            .push(Message::user("one"));
        assert!(memory.forget("s1").await);
        assert!(!memory.forget("s1").await);
        assert!(memory.snapshot("s1").await.is_none());
        assert!(memory.handle("s1").await.lock().await.messages.is_empty());
    }
}
