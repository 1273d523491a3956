//! The dispatch boundary between the reasoning loop and a handler.
//!
//! Every step event is classified and routed here. Classification and
//! handler failures stop at this boundary: they are logged, counted and
//! published, and the turn carries on. Nothing is retried.

use crate::classifier::EventClassifier;
use chrono::Utc;
use genbi_core::event::{DomainEvent, DropReason, EventBus};
use genbi_core::handler::{DispatchHandler, HandlerOp};
use genbi_core::step::{ClassifiedEvent, EventKind, StepEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Counters for everything that passed through a [`Dispatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events routed to at least one handler operation.
    pub dispatched: u64,
    pub unknown_dropped: u64,
    pub classification_failures: u64,
    /// Individual handler operations that failed.
    pub handler_failures: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    unknown_dropped: AtomicU64,
    classification_failures: AtomicU64,
    handler_failures: AtomicU64,
}

#[derive(Default)]
pub struct Dispatcher {
    counters: Counters,
    event_bus: Option<Arc<EventBus>>,
}

/// The handler operations for a classified event, in call order.
pub fn route(event: &ClassifiedEvent) -> Vec<(HandlerOp, &str)> {
    match event {
        ClassifiedEvent::SqlQuery { sql } => vec![(HandlerOp::Sql, sql.as_str())],
        ClassifiedEvent::TableConversion { csv } => vec![(HandlerOp::Data, csv.as_str())],
        ClassifiedEvent::ChartResult { code, image_ref } => {
            vec![
                (HandlerOp::Chart, image_ref.as_str()),
                (HandlerOp::ChartCode, code.as_str()),
            ]
        }
        ClassifiedEvent::PlainText { text } => vec![(HandlerOp::LastMessage, text.as_str())],
        ClassifiedEvent::Unknown { .. } => Vec::new(),
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Classify `event` and route it to `handler`.
    ///
    /// Returns the kind that was dispatched, or `None` when the event was
    /// dropped. Never fails.
    pub async fn dispatch(
        &self,
        event: &StepEvent,
        handler: &dyn DispatchHandler,
    ) -> Option<EventKind> {
        let classified = match EventClassifier::classify(event) {
            Ok(classified) => classified,
            Err(e) => {
                warn!(
                    session_id = %event.session_id,
                    source = %event.source_name,
                    error = %e,
                    "Dropping malformed step event"
                );
                self.counters
                    .classification_failures
                    .fetch_add(1, Ordering::Relaxed);
                self.publish(DomainEvent::EventDropped {
                    session_id: event.session_id.clone(),
                    source_name: event.source_name.clone(),
                    reason: DropReason::MalformedPayload,
                    timestamp: Utc::now(),
                });
                return None;
            }
        };

        let kind = classified.kind();
        if kind == EventKind::Unknown {
            debug!(
                session_id = %event.session_id,
                source = %event.source_name,
                "No handler for step event"
            );
            self.counters.unknown_dropped.fetch_add(1, Ordering::Relaxed);
            self.publish(DomainEvent::EventDropped {
                session_id: event.session_id.clone(),
                source_name: event.source_name.clone(),
                reason: DropReason::UnknownSource,
                timestamp: Utc::now(),
            });
            return None;
        }

        for (op, content) in route(&classified) {
            if let Err(e) = op.invoke(handler, content).await {
                warn!(
                    session_id = %event.session_id,
                    operation = op.name(),
                    error = %e,
                    "Handler operation failed"
                );
                self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                self.publish(DomainEvent::HandlerFailed {
                    session_id: event.session_id.clone(),
                    operation: op.name().to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }

        debug!(session_id = %event.session_id, kind = %kind, "Dispatched step event");
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        self.publish(DomainEvent::EventDispatched {
            session_id: event.session_id.clone(),
            kind,
            timestamp: Utc::now(),
        });
        Some(kind)
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            unknown_dropped: self.counters.unknown_dropped.load(Ordering::Relaxed),
            classification_failures: self
                .counters
                .classification_failures
                .load(Ordering::Relaxed),
            handler_failures: self.counters.handler_failures.load(Ordering::Relaxed),
        }
    }
}
