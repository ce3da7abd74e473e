//! Execution traces.
//!
//! A trace is the ordered, append-only record of one query: the user turn,
//! every model response (with any call requests it carried) and every tool
//! result fed back. It is exported as a list of steps tagged by `type`:
//!
//! ```json
//! [
//!   {"type": "user_message", "content": "add a row"},
//!   {"type": "model_message", "round": 1, "text": null,
//!    "calls": [{"id": "c1", "name": "activate_skill", "arguments": {"skill_name": "google-sheets"}}]},
//!   {"type": "tool_result", "round": 1, "call_id": "c1", "name": "activate_skill",
//!    "is_error": false, "content": "Skill 'google-sheets' activated."}
//! ]
//! ```

use chrono::{DateTime, Utc};
use conduit_llm::{ToolCall, ToolCallResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A call request as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Call id assigned by the model.
    pub id: String,
    /// Requested callable.
    pub name: String,
    /// Arguments as sent.
    pub arguments: Value,
}

impl From<&ToolCall> for CallRecord {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

/// One step of an execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// The query as the user sent it.
    UserMessage {
        /// Query text.
        content: String,
    },
    /// A model response.
    ModelMessage {
        /// 1-based model round.
        round: usize,
        /// Text, if the model answered in text.
        text: Option<String>,
        /// Call requests, empty for a text answer.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        calls: Vec<CallRecord>,
    },
    /// The outcome of one call request.
    ToolResult {
        /// Round in which the call was requested.
        round: usize,
        /// Call id this answers.
        call_id: String,
        /// Requested callable.
        name: String,
        /// Whether the call failed.
        is_error: bool,
        /// Payload or failure message as fed back to the model.
        content: String,
        /// Failure kind, e.g. `unknown_callable`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<String>,
    },
}

impl TraceStep {
    /// Whether this is a model response carrying call requests.
    #[must_use]
    pub fn is_call_request(&self) -> bool {
        matches!(self, Self::ModelMessage { calls, .. } if !calls.is_empty())
    }
}

/// Ordered record of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// When the query started.
    pub started_at: DateTime<Utc>,
    steps: Vec<TraceStep>,
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionTrace {
    /// Create an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    /// Record the user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.steps.push(TraceStep::UserMessage {
            content: content.into(),
        });
    }

    /// Record a text answer.
    pub fn push_model_text(&mut self, round: usize, text: impl Into<String>) {
        self.steps.push(TraceStep::ModelMessage {
            round,
            text: Some(text.into()),
            calls: Vec::new(),
        });
    }

    /// Record a response that requested calls.
    pub fn push_model_calls(&mut self, round: usize, calls: &[ToolCall]) {
        self.steps.push(TraceStep::ModelMessage {
            round,
            text: None,
            calls: calls.iter().map(CallRecord::from).collect(),
        });
    }

    /// Record the result of a call.
    pub fn push_tool_result(
        &mut self,
        round: usize,
        call: &ToolCall,
        result: &ToolCallResult,
        error_kind: Option<&str>,
    ) {
        self.steps.push(TraceStep::ToolResult {
            round,
            call_id: result.call_id.clone(),
            name: call.name.clone(),
            is_error: result.is_error,
            content: result.content.clone(),
            error_kind: error_kind.map(ToString::to_string),
        });
    }

    /// Steps in order.
    #[must_use]
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Model responses that requested at least one call.
    #[must_use]
    pub fn call_rounds(&self) -> usize {
        self.steps.iter().filter(|s| s.is_call_request()).count()
    }

    /// Number of model responses of any kind.
    #[must_use]
    pub fn model_rounds(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, TraceStep::ModelMessage { .. }))
            .count()
    }

    /// Tool result steps, in order.
    pub fn tool_results(&self) -> impl Iterator<Item = &TraceStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s, TraceStep::ToolResult { .. }))
    }

    /// Text of the final model answer, if the last model response was text.
    #[must_use]
    pub fn final_text(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|s| match s {
            TraceStep::ModelMessage { text, calls, .. } if calls.is_empty() => text.as_deref(),
            _ => None,
        })
    }

    /// Pretty-printed JSON export.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorded argument value cannot be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
