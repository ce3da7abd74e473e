//! Conduit Retrieval - deciding when private-document context is used.
//!
//! - [`SimilarityStore`] is the narrow interface to a vector or lexical
//!   index: `query(text, k)` returns passages ordered by ascending distance.
//! - [`MemoryStore`] is an in-process lexical store for tests and small
//!   document sets.
//! - [`RetrievalGate`] owns the policy: `rag` injects any passage, `auto`
//!   injects only when the best distance is at or below the threshold.
//! - [`context`] formats passages, sources and the grounded prompt.
//! - [`WebSearch`] backs the agent's `web_search` tool; [`DuckDuckGoSearch`]
//!   is the bundled implementation.
//!
//! Scores are distances: **lower is better**.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod context;
pub mod error;
pub mod gate;
pub mod store;
pub mod web;

pub use error::{RetrievalError, RetrievalResult};
pub use gate::{DEFAULT_K, DEFAULT_SCORE_THRESHOLD, GateOutcome, RetrievalGate};
pub use store::{MemoryStore, RetrievedPassage, SimilarityStore};
pub use web::{DEFAULT_WEB_RESULTS, DuckDuckGoSearch, WebResult, WebSearch, format_web_results};
