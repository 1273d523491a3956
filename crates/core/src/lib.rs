//! # genbi core
//!
//! Domain types, traits, and error definitions for the genbi analytics
//! agent. This crate has **zero framework dependencies**: it defines the
//! model that every other crate implements against.
//!
//! The centre of the domain is the dispatch pipeline: a reasoning turn
//! emits [`StepEvent`]s, each is classified into a [`ClassifiedEvent`],
//! and classified events are rendered by a [`DispatchHandler`] which
//! records compact [`SessionMessage`]s. Large outputs live in an
//! [`ArtifactStore`] and travel as ids.

pub mod artifact;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod provider;
pub mod session;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use artifact::{ArtifactRecord, ArtifactStore};
pub use error::{
    ArtifactError, ClassificationError, Error, HandlerError, ProviderError, Result, StreamError,
    ToolError,
};
pub use event::{DomainEvent, DropReason, EventBus};
pub use handler::{DispatchHandler, HandlerOp, NoopHandler};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{MessageKind, MessageRole, SessionMessage};
pub use step::{ClassifiedEvent, EventKind, StepEvent};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
