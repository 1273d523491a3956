//! History replay: re-render a session's recorded messages.
//!
//! Assistant messages are routed by their kind through the fixed
//! kind-to-operation mapping; user messages go to `process_user_message`.
//! Failures are logged and skipped, never fatal.

use genbi_core::handler::DispatchHandler;
use genbi_core::session::{MessageKind, MessageRole, SessionMessage};
use serde::Deserialize;
use tracing::warn;

/// Outcome of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub replayed: usize,
    pub skipped: usize,
}

/// Re-render `messages` in order through `handler`.
pub async fn replay(messages: &[SessionMessage], handler: &dyn DispatchHandler) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for message in messages {
        let result = match message.role {
            MessageRole::User => handler.process_user_message(&message.content).await,
            MessageRole::Assistant => {
                message
                    .kind
                    .operation()
                    .invoke(handler, &message.content)
                    .await
            }
        };
        match result {
            Ok(()) => summary.replayed += 1,
            Err(e) => {
                warn!(kind = message.kind.tag(), error = %e, "Replay of message failed");
                summary.skipped += 1;
            }
        }
    }
    summary
}

#[derive(Deserialize)]
struct WireMessage {
    role: MessageRole,
    r#type: String,
    content: String,
}

/// Replay records in their wire shape `{"role", "type", "content"}`.
///
/// Records with an unrecognized `type` tag, or that do not decode at all,
/// produce a warning and are skipped.
pub async fn replay_wire(
    records: &[serde_json::Value],
    handler: &dyn DispatchHandler,
) -> ReplaySummary {
    let mut messages = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        let wire = match WireMessage::deserialize(record) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable history record");
                skipped += 1;
                continue;
            }
        };
        let Some(kind) = MessageKind::from_tag(&wire.r#type) else {
            warn!(message_type = %wire.r#type, "No handler found for message type");
            skipped += 1;
            continue;
        };
        messages.push(SessionMessage {
            role: wire.role,
            kind,
            content: wire.content,
        });
    }

    let mut summary = replay(&messages, handler).await;
    summary.skipped += skipped;
    summary
}
