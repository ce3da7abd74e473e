//! Configuration types.
//!
//! These types mirror the domain settings without depending on other conduit
//! crates; conversion happens at the runtime boundary. Every struct
//! implements [`Default`] so a bare `[section]` header produces a working
//! configuration.

use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inference engine selection.
    pub model: ModelConfig,
    /// Mode controller and tool loop settings.
    pub runtime: RuntimeSection,
    /// Retrieval gate settings.
    pub retrieval: RetrievalSection,
    /// Capability bundle discovery.
    pub skills: SkillsSection,
    /// Logging level, format and target.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Inference engine provider and sampling settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: `"ollama"`, `"openai"` or `"openai-compat"`.
    pub provider: String,
    /// Model name sent to the provider.
    pub model: String,
    /// API key. Prefer environment variables over storing this in a file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Full chat-completions URL, overriding the provider default.
    #[serde(skip_serializing)]
    pub api_url: Option<String>,
    /// Maximum tokens per completion.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f64,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("has_api_url", &self.api_url.is_some())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Serialize for ModelConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ModelConfig", 4)?;
        state.serialize_field("provider", &self.provider)?;
        state.serialize_field("model", &self.model)?;
        state.serialize_field("max_tokens", &self.max_tokens)?;
        state.serialize_field("temperature", &self.temperature)?;
        state.end()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_owned(),
            model: "qwen2.5:7b".to_owned(),
            api_key: None,
            api_url: None,
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeSection
// ---------------------------------------------------------------------------

/// Mode controller and tool loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Mode used when a session has no override: `chat`, `rag`, `auto` or
    /// `agent`.
    pub default_mode: String,
    /// Maximum model rounds per agent query.
    pub max_rounds: usize,
    /// Consecutive failed activations that end an agent query.
    pub max_binding_failures: usize,
    /// Wall-clock limit per query in seconds. `0` disables it.
    pub request_timeout_secs: u64,
    /// Messages of conversation history kept per session.
    pub max_history: usize,
    /// Base system prompt. Empty uses the built-in prompt.
    pub system_prompt: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            default_mode: "auto".to_owned(),
            max_rounds: 8,
            max_binding_failures: 3,
            request_timeout_secs: 120,
            max_history: 20,
            system_prompt: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// RetrievalSection
// ---------------------------------------------------------------------------

/// Retrieval gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// Passages requested per query.
    pub k: usize,
    /// Best-distance threshold for `auto`. Lower is better.
    pub score_threshold: f64,
    /// Append a sources list to grounded answers.
    pub include_sources: bool,
    /// Expose `search_documents` to the model in `agent` mode.
    pub agent_search_tool: bool,
    /// Give the model a public `web_search` tool in `agent` mode.
    pub web_search: bool,
    /// Hits returned per web search.
    pub web_search_results: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            k: 4,
            score_threshold: 1.5,
            include_sources: true,
            agent_search_tool: true,
            web_search: true,
            web_search_results: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// SkillsSection
// ---------------------------------------------------------------------------

/// Capability bundle discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsSection {
    /// Skills root. Relative paths resolve against the workspace root.
    pub root: PathBuf,
    /// Default timeout for command callables, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for SkillsSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("skills"),
            command_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"` through `"error"`).
    pub level: String,
    /// `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// `"stdout"`, `"stderr"` or `"file"`.
    pub target: String,
    /// Directory for daily log files when `target = "file"`.
    pub directory: Option<PathBuf>,
    /// Per-crate directives, e.g. `["conduit_skills=debug"]`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directory: None,
            directives: Vec::new(),
        }
    }
}
