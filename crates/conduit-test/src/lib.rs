//! Conduit Test - Shared test utilities for the Conduit runtime.
//!
//! This crate provides a scripted inference engine, canned similarity stores
//! and on-disk skill bundle fixtures for use as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! conduit-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! #[cfg(test)]
//! mod tests {
//!     use conduit_test::{MockLlmProvider, MockLlmTurn};
//!     use conduit_llm::{LlmProvider, Message};
//!
//!     #[tokio::test]
//!     async fn test_replay() {
//!         let llm = MockLlmProvider::new(vec![MockLlmTurn::text("hi")]);
//!         let reply = llm.complete(&[Message::user("hello")], &[], "").await.unwrap();
//!         assert_eq!(reply.message.text(), Some("hi"));
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mock_llm;
pub mod stores;

pub use fixtures::*;
pub use harness::*;
pub use mock_llm::*;
pub use stores::*;
