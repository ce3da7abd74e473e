//! Conduit Runtime - mode controller and bounded tool-invocation loop.
//!
//! This crate provides:
//! - [`Orchestrator`], which routes each query through the retrieval gate,
//!   a single model call, or the agent loop depending on its mode
//! - [`ToolLoop`], the bounded call/execute/feed-back loop with
//!   on-demand skill activation
//! - [`ExecutionTrace`], the ordered record of every step of a query
//! - [`Session`], the per-user mode and bounded history
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use conduit_llm::OpenAiCompatProvider;
//! use conduit_runtime::{Orchestrator, RuntimeConfig, TurnOutcome};
//! use conduit_skills::{SkillLoader, SkillRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (registry, _problems) = SkillRegistry::discover("skills")?;
//! let loader = Arc::new(SkillLoader::new(Arc::new(registry)));
//! let orchestrator = Orchestrator::new(
//!     OpenAiCompatProvider::ollama("qwen2.5:7b"),
//!     loader,
//!     RuntimeConfig::default(),
//! );
//!
//! let mut session = orchestrator.new_session();
//! let cancel = CancellationToken::new();
//! if let TurnOutcome::Answered(answer) = orchestrator
//!     .handle(&mut session, "/agent add a row to my sheet", &cancel)
//!     .await?
//! {
//!     println!("{}", answer.text);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod config_bridge;
pub mod prelude;
pub mod prompt;
pub mod tools;

mod answer;
mod budget;
mod config;
mod controller;
mod error;
mod session;
mod tool_loop;
mod trace;

pub use answer::{Answer, AnswerStatus, Grounding};
pub use budget::{Interrupt, RequestBudget};
pub use config::{
    DEFAULT_MAX_BINDING_FAILURES, DEFAULT_MAX_HISTORY, DEFAULT_MAX_ROUNDS, DEFAULT_REQUEST_TIMEOUT,
    RuntimeConfig,
};
pub use controller::{Orchestrator, TurnOutcome};
pub use error::{RuntimeError, RuntimeResult};
pub use session::Session;
pub use tool_loop::{EMPTY_RESPONSE_NOTICE, LoopLimits, LoopOutcome, ToolLoop};
pub use trace::{CallRecord, ExecutionTrace, TraceStep};

// Re-export the mode type for convenience
pub use conduit_core::{OperatingMode, parse_directive};
