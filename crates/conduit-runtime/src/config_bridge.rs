//! Bridge from `conduit_config::Config` to domain types.
//!
//! The config crate has no dependencies on other conduit crates. These
//! functions translate its plain sections into the types the runtime, the
//! inference provider and the logging layer consume, so the CLI converts in
//! one place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use conduit_config::Config;
use conduit_core::OperatingMode;
use conduit_llm::{LlmError, LlmProvider, LlmResult, OpenAiCompatProvider, ProviderConfig};
use conduit_retrieval::{DuckDuckGoSearch, WebSearch};
use conduit_telemetry::{LogConfig, LogFormat, LogTarget};
use tracing::warn;

use crate::config::RuntimeConfig;

/// Directory used for file logging when none is configured.
const DEFAULT_LOG_DIR: &str = "logs";

/// Convert config to [`RuntimeConfig`].
///
/// An unrecognized `default_mode` falls back to `auto`; a zero
/// `request_timeout_secs` disables the deadline.
#[must_use]
pub fn to_runtime_config(cfg: &Config) -> RuntimeConfig {
    let default_mode = cfg
        .runtime
        .default_mode
        .parse::<OperatingMode>()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Invalid default mode, using auto");
            OperatingMode::default()
        });

    let request_timeout = match cfg.runtime.request_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    RuntimeConfig {
        default_mode,
        max_rounds: cfg.runtime.max_rounds,
        max_binding_failures: cfg.runtime.max_binding_failures,
        request_timeout,
        max_history: cfg.runtime.max_history,
        system_prompt: cfg.runtime.system_prompt.clone(),
        retrieval_k: cfg.retrieval.k,
        score_threshold: cfg.retrieval.score_threshold,
        include_sources: cfg.retrieval.include_sources,
        agent_search_tool: cfg.retrieval.agent_search_tool,
        agent_web_search: cfg.retrieval.web_search,
        web_search_results: cfg.retrieval.web_search_results,
    }
}

/// Build the web search backend for `agent` mode, if enabled.
#[must_use]
pub fn build_web_search(cfg: &Config) -> Option<Arc<dyn WebSearch>> {
    cfg.retrieval
        .web_search
        .then(|| Arc::new(DuckDuckGoSearch::new()) as Arc<dyn WebSearch>)
}

/// Convert config to [`ProviderConfig`].
///
/// The API key already includes environment fallbacks applied by
/// [`Config::load`].
#[must_use]
pub fn to_provider_config(cfg: &Config) -> ProviderConfig {
    let api_key = cfg.model.api_key.clone().unwrap_or_default();

    let mut provider = ProviderConfig::new(api_key, &cfg.model.model)
        .max_tokens(cfg.model.max_tokens)
        .temperature(cfg.model.temperature);

    if let Some(url) = &cfg.model.api_url {
        provider = provider.base_url(url);
    }

    provider
}

/// Build the configured inference provider.
///
/// # Errors
///
/// [`LlmError::ApiKeyNotConfigured`] for `openai` without a key, and
/// [`LlmError::ConfigError`] for an unknown provider name.
pub fn build_provider(cfg: &Config) -> LlmResult<Box<dyn LlmProvider>> {
    let provider_config = to_provider_config(cfg);

    let provider = match cfg.model.provider.as_str() {
        "openai" => {
            let Some(key) = cfg.model.api_key.as_deref().filter(|k| !k.is_empty()) else {
                return Err(LlmError::ApiKeyNotConfigured {
                    provider: "openai".to_string(),
                });
            };
            match &cfg.model.api_url {
                Some(url) => OpenAiCompatProvider::custom(url, Some(key), &cfg.model.model),
                None => OpenAiCompatProvider::openai(key, &cfg.model.model),
            }
            .with_max_tokens(provider_config.max_tokens)
            .with_temperature(provider_config.temperature)
        },
        "ollama" | "openai-compat" => OpenAiCompatProvider::from_config(&provider_config),
        other => {
            return Err(LlmError::ConfigError(format!(
                "unknown model provider '{other}' (expected ollama, openai or openai-compat)"
            )));
        },
    };

    Ok(Box::new(provider))
}

/// Convert config to [`LogConfig`].
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg.logging.format.parse().unwrap_or(LogFormat::Compact);

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);

    log_config = match cfg.logging.target.as_str() {
        "stdout" => log_config.with_target(LogTarget::Stdout),
        "file" => {
            let dir = cfg
                .logging
                .directory
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
            log_config.with_file_logging(dir)
        },
        _ => log_config.with_target(LogTarget::Stderr),
    };

    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }

    log_config
}

/// Resolve the skills root against the workspace.
#[must_use]
pub fn skills_root(cfg: &Config, workspace_root: &Path) -> PathBuf {
    if cfg.skills.root.is_absolute() {
        cfg.skills.root.clone()
    } else {
        workspace_root.join(&cfg.skills.root)
    }
}

/// Timeout for command-backed skill callables.
#[must_use]
pub fn command_timeout(cfg: &Config) -> Duration {
    Duration::from_secs(cfg.skills.command_timeout_secs)
}
