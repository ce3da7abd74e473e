//! Runtime error types.
//!
//! Only failures that end a query live here. Failures inside one round of
//! the tool loop are fed back to the model as tool results instead.

use std::time::Duration;

use conduit_llm::LlmError;
use thiserror::Error;

use crate::budget::Interrupt;
use crate::trace::ExecutionTrace;

/// Errors that terminate a query. Each carries the partial trace.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The request deadline passed.
    #[error("Request timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Configured timeout.
        timeout: Duration,
        /// Steps recorded before the deadline.
        trace: Box<ExecutionTrace>,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled {
        /// Steps recorded before cancellation.
        trace: Box<ExecutionTrace>,
    },

    /// The inference engine failed.
    #[error("LLM error: {source}")]
    Llm {
        /// Provider error.
        #[source]
        source: LlmError,
        /// Steps recorded before the failure.
        trace: Box<ExecutionTrace>,
    },

    /// The query was empty after directive parsing.
    #[error("Empty query")]
    EmptyInput,
}

impl RuntimeError {
    pub(crate) fn interrupted(
        interrupt: Interrupt,
        timeout: Option<Duration>,
        trace: &mut ExecutionTrace,
    ) -> Self {
        let trace = Box::new(std::mem::take(trace));
        match interrupt {
            Interrupt::Timeout => Self::Timeout {
                timeout: timeout.unwrap_or_default(),
                trace,
            },
            Interrupt::Cancelled => Self::Cancelled { trace },
        }
    }

    pub(crate) fn llm(source: LlmError, trace: &mut ExecutionTrace) -> Self {
        Self::Llm {
            source,
            trace: Box::new(std::mem::take(trace)),
        }
    }

    /// Short status label, distinct from every answer status.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Llm { .. } => "llm_error",
            Self::EmptyInput => "empty_input",
        }
    }

    /// The partial trace, if any steps were recorded.
    #[must_use]
    pub fn trace(&self) -> Option<&ExecutionTrace> {
        match self {
            Self::Timeout { trace, .. } | Self::Cancelled { trace } | Self::Llm { trace, .. } => {
                Some(trace)
            },
            Self::EmptyInput => None,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_takes_trace() {
        let mut trace = ExecutionTrace::new();
        trace.push_user("q");
        let err = RuntimeError::interrupted(
            Interrupt::Timeout,
            Some(Duration::from_secs(3)),
            &mut trace,
        );
        assert!(trace.is_empty());
        assert_eq!(err.status(), "timeout");
        assert_eq!(err.trace().map(ExecutionTrace::len), Some(1));
        assert_eq!(err.to_string(), "Request timed out after 3s");
    }

    #[test]
    fn test_cancelled_status() {
        let mut trace = ExecutionTrace::new();
        let err = RuntimeError::interrupted(Interrupt::Cancelled, None, &mut trace);
        assert!(matches!(err, RuntimeError::Cancelled { .. }));
        assert_eq!(err.status(), "cancelled");
    }

    #[test]
    fn test_empty_input_has_no_trace() {
        assert!(RuntimeError::EmptyInput.trace().is_none());
    }
}
