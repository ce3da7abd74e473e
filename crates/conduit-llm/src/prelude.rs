//! Prelude module - commonly used types for convenient import.
//!
//! Use `use conduit_llm::prelude::*;` to import all essential types.
//!
//! # Example with Ollama
//!
//! ```rust,no_run
//! use conduit_llm::prelude::*;
//!
//! # async fn example() -> LlmResult<()> {
//! // Connect to a local Ollama server
//! let provider = OpenAiCompatProvider::ollama("qwen2.5:7b");
//!
//! let response = provider
//!     .complete(&[Message::user("Hello!")], &[], "You are terse.")
//!     .await?;
//! println!("Response: {}", response.message.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

// Errors
pub use crate::{LlmError, LlmResult};

// Provider trait and config
pub use crate::{LlmProvider, OpenAiCompatProvider, ProviderConfig};

// Message types
pub use crate::{Message, MessageContent, MessageRole};

// Response types
pub use crate::{LlmResponse, StopReason, Usage};

// Tool types
pub use crate::{LlmToolDefinition, ToolCall, ToolCallResult};
