//! Conduit LLM - Inference-engine abstraction for the Conduit orchestrator.
//!
//! The orchestrator only needs one operation from a model: given the message
//! history, the currently exposed tool schemas and a system prompt, return
//! either text or a set of tool call requests. [`LlmProvider`] captures that
//! contract; [`OpenAiCompatProvider`] implements it over any OpenAI-compatible
//! chat-completions endpoint (Ollama, vLLM, LM Studio, `OpenAI`).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod error;
mod openai_compat;
mod provider;
mod types;

pub use error::{LlmError, LlmResult};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, ProviderConfig};
pub use types::{
    LlmResponse, LlmToolDefinition, Message, MessageContent, MessageRole, StopReason, ToolCall,
    ToolCallResult, Usage,
};
