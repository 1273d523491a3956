//! Helpers shared by the tools that delegate to the model.

use genbi_core::error::ToolError;
use genbi_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::debug;

/// A provider handle plus the model to address, shared by LLM-backed tools.
#[derive(Clone)]
pub struct ModelHandle {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl ModelHandle {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Send a single prompt and return the reply text.
    ///
    /// Provider failures surface as [`ToolError::ExecutionFailed`] for `tool_name`.
    pub async fn ask(&self, tool_name: &str, prompt: String) -> Result<String, ToolError> {
        debug!(tool = tool_name, prompt_len = prompt.len(), "Prompting model");
        let response = self
            .provider
            .complete(ProviderRequest::prompt(&self.model, prompt))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: e.to_string(),
            })?;
        Ok(response.message.content.trim().to_string())
    }
}

/// Pull a required string argument out of a tool call.
pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Drop a surrounding markdown code fence, if the model added one.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
