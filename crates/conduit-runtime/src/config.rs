//! Runtime configuration types and defaults.

use std::time::Duration;

use conduit_core::OperatingMode;
use conduit_retrieval::{DEFAULT_K, DEFAULT_SCORE_THRESHOLD, DEFAULT_WEB_RESULTS};

/// Default model rounds per agent query.
pub const DEFAULT_MAX_ROUNDS: usize = 8;
/// Default consecutive activation failures tolerated per query.
pub const DEFAULT_MAX_BINDING_FAILURES: usize = 3;
/// Default wall-clock limit per query.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Default messages of history kept per session.
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Mode for new sessions.
    pub default_mode: OperatingMode,
    /// Model rounds per agent query.
    pub max_rounds: usize,
    /// Consecutive failed activations that end an agent query.
    pub max_binding_failures: usize,
    /// Wall-clock limit per query. `None` disables it.
    pub request_timeout: Option<Duration>,
    /// Messages of history kept per session.
    pub max_history: usize,
    /// Base system prompt. Empty uses the built-in prompt.
    pub system_prompt: String,
    /// Passages retrieved per query.
    pub retrieval_k: usize,
    /// Best-distance threshold for `auto`.
    pub score_threshold: f64,
    /// Append a sources list to grounded answers.
    pub include_sources: bool,
    /// Expose `search_documents` in `agent` mode when a store is attached.
    pub agent_search_tool: bool,
    /// Expose `web_search` in `agent` mode when a backend is attached.
    pub agent_web_search: bool,
    /// Hits returned by `web_search`.
    pub web_search_results: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_mode: OperatingMode::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_binding_failures: DEFAULT_MAX_BINDING_FAILURES,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_history: DEFAULT_MAX_HISTORY,
            system_prompt: String::new(),
            retrieval_k: DEFAULT_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            include_sources: true,
            agent_search_tool: true,
            agent_web_search: true,
            web_search_results: DEFAULT_WEB_RESULTS,
        }
    }
}

impl RuntimeConfig {
    /// Set the round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Set or clear the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the `auto` threshold.
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Set the default mode.
    #[must_use]
    pub fn with_default_mode(mut self, mode: OperatingMode) -> Self {
        self.default_mode = mode;
        self
    }
}
