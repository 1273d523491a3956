//! Shared test helpers for the agent crate.

use genbi_core::error::{HandlerError, ProviderError};
use genbi_core::handler::DispatchHandler;
use genbi_core::message::{Message, MessageToolCall};
use genbi_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// Records every handler call as `(operation, content)`.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<(String, String)>>,
    fail_on: Option<&'static str>,
}

impl RecordingHandler {
    pub fn failing_on(operation: &'static str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(operation),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, content: &str) -> Result<(), HandlerError> {
        if self.fail_on == Some(operation) {
            return Err(HandlerError::new(operation, "render failed"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), content.to_string()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl DispatchHandler for RecordingHandler {
    async fn process_sql(&self, sql: &str) -> Result<(), HandlerError> {
        self.record("process_sql", sql)
    }
    async fn process_chart(&self, image_id: &str) -> Result<(), HandlerError> {
        self.record("process_chart", image_id)
    }
    async fn process_chart_code(&self, code: &str) -> Result<(), HandlerError> {
        self.record("process_chart_code", code)
    }
    async fn process_data(&self, csv: &str) -> Result<(), HandlerError> {
        self.record("process_data", csv)
    }
    async fn process_last_message(&self, text: &str) -> Result<(), HandlerError> {
        self.record("process_last_message", text)
    }
    async fn process_user_message(&self, text: &str) -> Result<(), HandlerError> {
        self.record("process_user_message", text)
    }
}

/// A mock provider that returns a sequence of scripted responses and keeps
/// every request it received.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, idx: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[idx].clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let responses = self.responses.lock().unwrap();
        match responses.get(count - 1) {
            Some(response) => Ok(response.clone()),
            None => Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("no scripted response for call #{count}"),
            }),
        }
    }
}

/// A text response with no tool calls.
pub fn make_text_response(text: &str) -> ProviderResponse {
    make_tool_call_response(Vec::new(), text)
}

/// A response carrying tool calls.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
