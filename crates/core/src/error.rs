//! Error types for the genbi domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::time::Duration;
use thiserror::Error;

/// The top-level error type for all genbi operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Artifact errors ---
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    // --- Turn errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Whether the model can be told about this failure and carry on.
    ///
    /// Unknown tools and malformed arguments are the model's mistake; an
    /// execution failure means a collaborator broke and ends the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidArguments(_))
    }
}

/// Precondition violations on the artifact store. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// A recognized step event whose payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("Malformed {source_name} payload: {reason}")]
    MalformedPayload { source_name: String, reason: String },

    #[error("{source_name} payload is missing field '{field}'")]
    MissingField {
        source_name: String,
        field: &'static str,
    },
}

/// A dispatch handler operation failed internally.
#[derive(Debug, Clone, Error)]
#[error("Handler operation {operation} failed: {reason}")]
pub struct HandlerError {
    pub operation: &'static str,
    pub reason: String,
}

impl HandlerError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// The reasoning loop itself failed; the turn is aborted.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Provider failed during turn: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool failed during turn: {0}")]
    Tool(#[from] ToolError),

    #[error("Turn exceeded {0:?}")]
    Timeout(Duration),

    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_recoverability() {
        assert!(ToolError::NotFound("chart".into()).is_recoverable());
        assert!(ToolError::InvalidArguments("missing prompt".into()).is_recoverable());
        assert!(
            !ToolError::ExecutionFailed {
                tool_name: "sql_db_query".into(),
                reason: "connection refused".into(),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn stream_error_wraps_tool_error() {
        let err: StreamError = ToolError::ExecutionFailed {
            tool_name: "visualize_table".into(),
            reason: "renderer exited with 1".into(),
        }
        .into();
        assert!(err.to_string().contains("visualize_table"));
        assert!(matches!(err, StreamError::Tool(_)));
    }

    #[test]
    fn classification_error_names_the_source() {
        let err = ClassificationError::MissingField {
            source_name: "visualize_table".into(),
            field: "image",
        };
        assert_eq!(
            err.to_string(),
            "visualize_table payload is missing field 'image'"
        );
    }
}
