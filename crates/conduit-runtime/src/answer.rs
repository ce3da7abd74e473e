//! What a completed query hands back to its caller.

use std::fmt;

use conduit_core::OperatingMode;
use conduit_retrieval::context::{NO_CONTEXT_NOTICE, STORE_UNAVAILABLE_NOTICE};
use serde::{Deserialize, Serialize};

use crate::trace::ExecutionTrace;

/// How a query that produced an answer ended.
///
/// Every non-`Completed` status carries a synthesized answer text; none of
/// them is ever blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// The model answered in text.
    Completed,
    /// The round cap was reached while the model still requested calls.
    IterationBudgetExhausted,
    /// Too many consecutive skill activations failed.
    BindingFailuresExhausted,
    /// The model's final text was blank.
    EmptyResponse,
}

impl AnswerStatus {
    /// Snake-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::IterationBudgetExhausted => "iteration_budget_exhausted",
            Self::BindingFailuresExhausted => "binding_failures_exhausted",
            Self::EmptyResponse => "empty_response",
        }
    }

    /// Whether the text came from the model rather than a fallback.
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What retrieval contributed to the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Grounding {
    /// The mode does not retrieve up front.
    NotAttempted,
    /// Passages were injected.
    Grounded {
        /// Distinct source ids, in rank order.
        sources: Vec<String>,
        /// Distance of the best passage.
        best_score: f64,
    },
    /// Retrieval ran but nothing was usable, or no store is attached.
    NoUsableContext {
        /// Best distance seen, if any passage came back.
        best_score: Option<f64>,
    },
    /// The store failed; the answer is ungrounded.
    StoreUnavailable {
        /// Store error.
        reason: String,
    },
}

impl Grounding {
    /// Whether context was injected.
    #[must_use]
    pub fn is_grounded(&self) -> bool {
        matches!(self, Self::Grounded { .. })
    }
}

/// The result of one query.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Answer text shown to the user.
    pub text: String,
    /// How the query ended.
    pub status: AnswerStatus,
    /// Mode the query ran in.
    pub mode: OperatingMode,
    /// Retrieval outcome.
    pub grounding: Grounding,
    /// Full execution trace.
    pub trace: ExecutionTrace,
    /// Model rounds used.
    pub rounds: usize,
    /// Skills activated during the query.
    pub activated: Vec<String>,
}

impl Answer {
    /// A short line to show beside an ungrounded answer, if one applies.
    ///
    /// `rag` explicitly asked for documents, so a miss is worth saying;
    /// `auto` falls back silently unless the store failed.
    #[must_use]
    pub fn notice(&self) -> Option<&'static str> {
        match &self.grounding {
            Grounding::StoreUnavailable { .. } => Some(STORE_UNAVAILABLE_NOTICE),
            Grounding::NoUsableContext { .. } if self.mode == OperatingMode::Rag => {
                Some(NO_CONTEXT_NOTICE)
            },
            _ => None,
        }
    }

    /// Model responses that requested calls.
    #[must_use]
    pub fn call_rounds(&self) -> usize {
        self.trace.call_rounds()
    }
}
