//! The reasoning loop: one conversational turn per `stream` call.
//!
//! Each turn calls the model, executes the tools it asks for, and feeds
//! every tool observation through the dispatcher in the order it happened.
//! The final answer is dispatched last.

use crate::dispatch::{DispatchStats, Dispatcher};
use chrono::{DateTime, Utc};
use genbi_core::error::{StreamError, ToolError};
use genbi_core::event::{DomainEvent, EventBus};
use genbi_core::handler::DispatchHandler;
use genbi_core::message::{Conversation, Message, MessageToolCall};
use genbi_core::provider::{Provider, ProviderRequest};
use genbi_core::step::StepEvent;
use genbi_core::tool::{ToolCall, ToolRegistry};
use genbi_memory::{ConversationMemory, Session, SessionStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Returned as the final answer when a turn runs out of iterations.
pub const MAX_ITERATIONS_MESSAGE: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

pub struct ReasoningLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,

    /// Maximum model round-trips per turn
    max_iterations: u32,
    turn_timeout: Option<Duration>,

    event_bus: Arc<EventBus>,
    dispatcher: Dispatcher,

    /// Conversational memory, keyed by session id
    memory: Arc<ConversationMemory>,
    sessions: SessionStore,
}

impl ReasoningLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: String::new(),
            max_iterations: 25,
            turn_timeout: None,
            dispatcher: Dispatcher::new().with_event_bus(event_bus.clone()),
            event_bus,
            memory: Arc::new(ConversationMemory::new()),
            sessions: SessionStore::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Abort turns that run longer than `timeout`.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    /// Share a session store with the front end's handlers.
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Run one turn for `session_id` and return the final answer.
    ///
    /// Turns for the same session are serialized. Step events reach
    /// `handler` as they happen; on failure, whatever was already
    /// dispatched stays dispatched and the conversation is rolled back to
    /// where the turn started.
    pub async fn stream(
        &self,
        query: &str,
        session_id: &str,
        handler: &dyn DispatchHandler,
    ) -> Result<String, StreamError> {
        if session_id.trim().is_empty() {
            return Err(StreamError::InvalidSession(session_id.to_string()));
        }
        if self.sessions.open(session_id).await {
            info!(session_id, "Opened session");
        }

        let handle = self.memory.handle(session_id).await;
        let mut conversation = handle.lock().await;
        let checkpoint = conversation.messages.len();

        info!(session_id, history = checkpoint, "Starting turn");
        let start = Instant::now();
        let mut iterations = 0;

        let turn = self.run_turn(&mut conversation, query, handler, &mut iterations);
        let outcome = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, turn)
                .await
                .unwrap_or(Err(StreamError::Timeout(limit))),
            None => turn.await,
        };

        if let Err(e) = &outcome {
            error!(session_id, error = %e, "Turn failed");
            conversation.messages.truncate(checkpoint);
        }
        self.sessions.touch(session_id).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.event_bus.publish(DomainEvent::TurnCompleted {
            session_id: session_id.to_string(),
            success: outcome.is_ok(),
            iterations,
            duration_ms,
            timestamp: Utc::now(),
        });
        debug!(session_id, iterations, duration_ms, "Turn finished");
        outcome
    }

    async fn run_turn(
        &self,
        conversation: &mut Conversation,
        query: &str,
        handler: &dyn DispatchHandler,
        iterations: &mut u32,
    ) -> Result<String, StreamError> {
        let session_id = conversation.session_id.clone();
        if !self.system_prompt.is_empty() {
            conversation.set_system_prompt(&self.system_prompt);
        }
        conversation.push(Message::user(query));

        let tool_definitions = self.tools.definitions();
        let answer = loop {
            if *iterations >= self.max_iterations {
                warn!(
                    session_id = %session_id,
                    iterations = *iterations,
                    "Max tool iterations reached"
                );
                break MAX_ITERATIONS_MESSAGE.to_string();
            }
            *iterations += 1;

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };
            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    session_id: session_id.clone(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            if !response.message.has_tool_calls() {
                let text = response.message.content.clone();
                conversation.push(response.message);
                break text;
            }

            debug!(
                session_id = %session_id,
                tool_count = response.message.tool_calls.len(),
                "Executing tool calls"
            );
            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            for tc in &tool_calls {
                let observation = self.execute_tool(tc, &session_id, handler).await?;
                conversation.push(Message::tool_result(&tc.id, observation));
            }
        };

        if answer.trim().is_empty() {
            return Ok(String::new());
        }
        self.dispatcher
            .dispatch(&StepEvent::final_answer(&answer, &session_id), handler)
            .await;
        Ok(answer)
    }

    /// Run one tool call and return the observation for the model.
    ///
    /// Successful results are dispatched as step events. Mistakes the model
    /// can correct come back as an error observation; anything else is fatal.
    async fn execute_tool(
        &self,
        tc: &MessageToolCall,
        session_id: &str,
        handler: &dyn DispatchHandler,
    ) -> Result<String, StreamError> {
        let arguments = if tc.arguments.trim().is_empty() {
            Ok(serde_json::json!({}))
        } else {
            serde_json::from_str(&tc.arguments)
                .map_err(|e| ToolError::InvalidArguments(format!("arguments are not JSON: {e}")))
        };

        let start = Instant::now();
        let result = match arguments {
            Ok(arguments) => {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };
                self.tools.execute(&call).await
            }
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let success = matches!(&result, Ok(r) if r.success);
        self.event_bus.publish(DomainEvent::ToolExecuted {
            session_id: session_id.to_string(),
            tool_name: tc.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(tool_result) => {
                if tool_result.success {
                    let step = StepEvent::new(&tc.name, &tool_result.output, session_id);
                    self.dispatcher.dispatch(&step, handler).await;
                } else {
                    debug!(tool = %tc.name, output = %tool_result.output, "Tool reported failure");
                }
                Ok(tool_result.output)
            }
            Err(e) if e.is_recoverable() => {
                warn!(tool = %tc.name, error = %e, "Tool call rejected");
                Ok(format!("Error: {e}"))
            }
            Err(e) => {
                error!(tool = %tc.name, error = %e, "Tool execution failed");
                Err(StreamError::Tool(e))
            }
        }
    }

    /// Close a session: drop its rendered history and conversational memory.
    /// A later `stream` for the same id starts a fresh conversation.
    pub async fn close_session(&self, session_id: &str) -> Option<Session> {
        self.memory.forget(session_id).await;
        let closed = self.sessions.close(session_id).await;
        if closed.is_some() {
            info!(session_id, "Closed session");
        }
        closed
    }

    /// Close every session idle past the store's timeout. Returns their ids.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let evicted = self.sessions.evict_idle(now).await;
        for id in &evicted {
            self.memory.forget(id).await;
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle sessions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        RecordingHandler, SequentialMockProvider, make_text_response, make_tool_call,
        make_tool_call_response,
    };
    use async_trait::async_trait;
    use genbi_core::message::Role;
    use genbi_core::tool::{Tool, ToolResult};

    /// Echoes its `text` argument; fails hard on "boom".
    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "Echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            match arguments["text"].as_str() {
                Some("boom") => Err(ToolError::ExecutionFailed {
                    tool_name: self.name.into(),
                    reason: "collaborator crashed".into(),
                }),
                Some(text) => Ok(ToolResult::ok(text)),
                None => Err(ToolError::InvalidArguments("Missing 'text' argument".into())),
            }
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool {
            name: "sql_db_query_checker",
        }));
        registry.register(Box::new(EchoTool {
            name: "sql_db_query",
        }));
        Arc::new(registry)
    }

    fn agent(provider: Arc<SequentialMockProvider>) -> ReasoningLoop {
        ReasoningLoop::new(provider, "mock-model", 0.0, registry(), Arc::new(EventBus::default()))
            .with_system_prompt("You answer questions about a SQLite database.")
    }

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response(
            "There are 275 artists.",
        )]));
        let agent = agent(provider);
        let handler = RecordingHandler::default();

        let answer = agent.stream("How many artists?", "s1", &handler).await.unwrap();
        assert_eq!(answer, "There are 275 artists.");
        assert_eq!(
            handler.calls(),
            vec![(
                "process_last_message".to_string(),
                "There are 275 artists.".to_string()
            )]
        );

        // System + User + Assistant
        let conv = agent.memory().snapshot("s1").await.unwrap();
        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn tool_observations_dispatched_in_order() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call(
                    "sql_db_query_checker",
                    serde_json::json!({ "text": "SELECT COUNT(*) FROM artists" }),
                )],
                "",
            ),
            make_tool_call_response(
                vec![make_tool_call("sql_db_query", serde_json::json!({ "text": "[(275,)]" }))],
                "",
            ),
            make_text_response("275"),
        ]));
        let agent = agent(provider.clone());
        let handler = RecordingHandler::default();

        let answer = agent.stream("How many artists?", "s1", &handler).await.unwrap();
        assert_eq!(answer, "275");
        assert_eq!(
            handler.calls(),
            vec![
                (
                    "process_sql".to_string(),
                    "SELECT COUNT(*) FROM artists".to_string()
                ),
                ("process_last_message".to_string(), "275".to_string()),
            ]
        );
        assert_eq!(provider.call_count(), 3);

        let stats = agent.dispatch_stats();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.unknown_dropped, 1);
    }

    #[tokio::test]
    async fn empty_answer_is_not_dispatched() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("")]));
        let agent = agent(provider);
        let handler = RecordingHandler::default();

        let answer = agent.stream("Hello", "s1", &handler).await.unwrap();
        assert_eq!(answer, "");
        assert!(handler.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_arguments_are_fed_back() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("sql_db_query", serde_json::json!({}))],
                "",
            ),
            make_text_response("Sorry"),
        ]));
        let agent = agent(provider.clone());

        let answer = agent.stream("q", "s1", &RecordingHandler::default()).await.unwrap();
        assert_eq!(answer, "Sorry");

        let second = provider.request(1);
        let observation = second.messages.last().unwrap();
        assert_eq!(observation.role, Role::Tool);
        assert!(observation.content.starts_with("Error: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn execution_failure_aborts_turn_but_keeps_dispatched() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![
                make_tool_call("sql_db_query_checker", serde_json::json!({ "text": "SELECT 1" })),
                make_tool_call("sql_db_query", serde_json::json!({ "text": "boom" })),
            ],
            "",
        )]));
        let agent = agent(provider);
        let handler = RecordingHandler::default();

        let err = agent.stream("q", "s1", &handler).await.unwrap_err();
        assert!(matches!(err, StreamError::Tool(ToolError::ExecutionFailed { .. })));
        assert_eq!(
            handler.calls(),
            vec![("process_sql".to_string(), "SELECT 1".to_string())]
        );
        // The failed turn is not remembered
        assert!(agent.memory().snapshot("s1").await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_stream_error() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let agent = agent(provider);
        let err = agent
            .stream("q", "s1", &RecordingHandler::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Provider(_)));
    }

    #[tokio::test]
    async fn max_iterations_returns_canned_answer() {
        let loop_call = || {
            make_tool_call_response(
                vec![make_tool_call("sql_db_query", serde_json::json!({ "text": "x" }))],
                "",
            )
        };
        let provider = Arc::new(SequentialMockProvider::new(vec![loop_call(), loop_call()]));
        let agent = agent(provider.clone()).with_max_iterations(2);
        let handler = RecordingHandler::default();

        let answer = agent.stream("q", "s1", &handler).await.unwrap();
        assert_eq!(answer, MAX_ITERATIONS_MESSAGE);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(handler.calls().last().unwrap().0, "process_last_message");
    }

    #[tokio::test]
    async fn empty_session_id_rejected() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let agent = agent(provider.clone());
        let err = agent
            .stream("q", "  ", &RecordingHandler::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidSession(_)));
        assert_eq!(provider.call_count(), 0);
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }
        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<genbi_core::provider::ProviderResponse, genbi_core::error::ProviderError>
        {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(make_text_response("late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timeout() {
        let agent = ReasoningLoop::new(
            Arc::new(SlowProvider),
            "m",
            0.0,
            registry(),
            Arc::new(EventBus::default()),
        )
        .with_turn_timeout(Duration::from_secs(5));

        let err = agent
            .stream("q", "s1", &RecordingHandler::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn close_session_forgets_memory() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("first"),
            make_text_response("second"),
        ]));
        let agent = agent(provider.clone());
        let handler = RecordingHandler::default();

        agent.stream("one", "s1", &handler).await.unwrap();
        assert!(agent.sessions().exists("s1").await);
        assert!(agent.close_session("s1").await.is_some());
        assert!(agent.memory().snapshot("s1").await.is_none());

        agent.stream("two", "s1", &handler).await.unwrap();
        // Fresh conversation: system prompt + "two"
        assert_eq!(provider.request(1).messages.len(), 2);
    }

    #[tokio::test]
    async fn evict_idle_forgets_memory() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("first"),
            make_text_response("second"),
        ]));
        let agent = agent(provider.clone())
            .with_sessions(SessionStore::new().with_idle_timeout(Duration::from_secs(60)));
        let handler = RecordingHandler::default();

        agent.stream("one", "s1", &handler).await.unwrap();
        assert!(agent.evict_idle(Utc::now()).await.is_empty());
        assert!(agent.memory().snapshot("s1").await.is_some());

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(agent.evict_idle(later).await, vec!["s1".to_string()]);
        assert!(!agent.sessions().exists("s1").await);
        assert!(agent.memory().snapshot("s1").await.is_none());

        agent.stream("two", "s1", &handler).await.unwrap();
        let request = provider.request(1);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "two");
    }

    #[tokio::test]
    async fn no_system_message_without_prompt() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("ok")]));
        let agent = ReasoningLoop::new(
            provider.clone(),
            "mock-model",
            0.0,
            registry(),
            Arc::new(EventBus::default()),
        );

        agent.stream("q", "s1", &RecordingHandler::default()).await.unwrap();

        let request = provider.request(0);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "q");
    }

    #[tokio::test]
    async fn turn_events_published() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("ok")]));
        let agent = ReasoningLoop::new(provider, "m", 0.0, registry(), bus);

        agent.stream("q", "s1", &RecordingHandler::default()).await.unwrap();

        let mut saw_turn = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::TurnCompleted {
                success, iterations, ..
            } = event.as_ref()
            {
                assert!(*success);
                assert_eq!(*iterations, 1);
                saw_turn = true;
            }
        }
        assert!(saw_turn);
    }
}
