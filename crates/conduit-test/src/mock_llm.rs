//! Mock inference engine for testing.
//!
//! Provides [`MockLlmProvider`], a deterministic queue-based [`LlmProvider`]
//! that replays scripted turns and records what each request carried: the
//! messages, the exposed tool names and the system prompt. Tests of the tool
//! loop assert on those recordings to check what the model was allowed to
//! see at each round.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use conduit_llm::{
    LlmError, LlmProvider, LlmResponse, LlmResult, LlmToolDefinition, Message, ToolCall,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single scripted turn that the mock provider will replay.
#[derive(Debug, Clone)]
pub enum MockLlmTurn {
    /// A text response.
    Text(
        /// The text the assistant produces.
        String,
    ),
    /// One or more tool calls.
    ToolCalls(
        /// The calls to emit.
        Vec<ToolCall>,
    ),
    /// Fail the request.
    Error(
        /// The error message.
        String,
    ),
}

impl MockLlmTurn {
    /// A text turn.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A turn requesting exactly one call.
    #[must_use]
    pub fn call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self::ToolCalls(vec![ToolCall::new(id, name).with_arguments(args)])
    }

    /// A turn requesting several calls at once.
    #[must_use]
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self::ToolCalls(calls)
    }

    /// A failing turn.
    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }
}

/// What one request to the provider carried.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Conversation sent.
    pub messages: Vec<Message>,
    /// Names of the exposed tools, in order.
    pub tools: Vec<String>,
    /// System prompt.
    pub system: String,
}

// ---------------------------------------------------------------------------
// MockLlmProvider
// ---------------------------------------------------------------------------

/// A deterministic, queue-based [`LlmProvider`] for tests.
///
/// Turns are popped from the front of the queue on each call to
/// [`complete`](LlmProvider::complete). When the queue is exhausted an error
/// is returned.
pub struct MockLlmProvider {
    turns: Mutex<VecDeque<MockLlmTurn>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Option<Duration>,
}

impl MockLlmProvider {
    /// Create a provider preloaded with the given turns.
    #[must_use]
    pub fn new(turns: Vec<MockLlmTurn>) -> Self {
        Self {
            turns: Mutex::new(VecDeque::from(turns)),
            requests: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Sleep for `latency` before answering each request.
    ///
    /// The sleep uses tokio's clock, so paused-time tests advance through it
    /// instantly.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    /// Every request received, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    /// Messages of each request.
    #[must_use]
    pub fn recorded_messages(&self) -> Vec<Vec<Message>> {
        self.requests().into_iter().map(|r| r.messages).collect()
    }

    /// Exposed tool names of each request.
    #[must_use]
    pub fn recorded_tools(&self) -> Vec<Vec<String>> {
        self.requests().into_iter().map(|r| r.tools).collect()
    }

    /// System prompt of each request.
    #[must_use]
    pub fn recorded_systems(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.system).collect()
    }

    /// Turns not yet replayed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.turns.lock().expect("lock poisoned").len()
    }

    fn next_turn(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<MockLlmTurn> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.clone()).collect(),
                system: system.to_string(),
            });

        self.turns
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| {
                LlmError::ApiRequestFailed("MockLlmProvider: no more turns queued".to_string())
            })
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<LlmResponse> {
        let turn = self.next_turn(messages, tools, system)?;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match turn {
            MockLlmTurn::Text(text) => Ok(LlmResponse::text(text)),
            MockLlmTurn::ToolCalls(calls) => Ok(LlmResponse::tool_calls(calls)),
            MockLlmTurn::Error(msg) => Err(LlmError::ApiRequestFailed(msg)),
        }
    }
}
