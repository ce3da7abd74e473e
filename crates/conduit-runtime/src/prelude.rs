//! Prelude module - commonly used types for convenient import.
//!
//! Use `use conduit_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{RuntimeError, RuntimeResult};

// Orchestration
pub use crate::{Orchestrator, RuntimeConfig, Session, TurnOutcome};

// Results
pub use crate::{Answer, AnswerStatus, ExecutionTrace, Grounding, TraceStep};

// Modes
pub use crate::OperatingMode;
