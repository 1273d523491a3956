//! Domain event system: observability hooks for the dispatch pipeline.
//!
//! Drops, handler failures and turn completions are published here so
//! front ends and tests can observe them without coupling to the loop.

use crate::step::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Why a step event did not reach a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Source name outside the classifier's vocabulary.
    UnknownSource,
    /// Recognized source with an undecodable payload.
    MalformedPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A classified event was forwarded to the handler.
    EventDispatched {
        session_id: String,
        kind: EventKind,
        timestamp: DateTime<Utc>,
    },

    /// A step event was dropped before dispatch.
    EventDropped {
        session_id: String,
        source_name: String,
        reason: DropReason,
        timestamp: DateTime<Utc>,
    },

    /// A handler operation failed and was contained.
    HandlerFailed {
        session_id: String,
        operation: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        session_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a response
    ResponseGenerated {
        session_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A turn finished, successfully or not.
    TurnCompleted {
        session_id: String,
        success: bool,
        iterations: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
