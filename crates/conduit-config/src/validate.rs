//! Post-merge validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Providers the runtime knows how to construct.
pub const SUPPORTED_PROVIDERS: &[&str] = &["ollama", "openai", "openai-compat"];

/// Mode names accepted for `runtime.default_mode`.
pub const SUPPORTED_MODES: &[&str] = &["chat", "rag", "auto", "agent"];

const SUPPORTED_LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];
const SUPPORTED_LOG_TARGETS: &[&str] = &["stdout", "stderr", "file"];
const SUPPORTED_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound on `runtime.max_rounds`.
const MAX_ROUNDS_UPPER_BOUND: usize = 64;

/// Upper bound on `model.max_tokens`.
const MAX_TOKENS_UPPER_BOUND: usize = 1_000_000;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_model(config)?;
    validate_runtime(config)?;
    validate_retrieval(config)?;
    validate_skills(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_model(config: &Config) -> ConfigResult<()> {
    let m = &config.model;

    if !SUPPORTED_PROVIDERS.contains(&m.provider.as_str()) {
        return Err(invalid(
            "model.provider",
            format!(
                "unsupported provider '{}'; expected one of: {}",
                m.provider,
                SUPPORTED_PROVIDERS.join(", ")
            ),
        ));
    }

    if m.model.trim().is_empty() {
        return Err(invalid("model.model", "model name must not be empty"));
    }

    if m.provider == "openai-compat" && m.api_url.as_deref().is_none_or(str::is_empty) {
        return Err(invalid(
            "model.api_url",
            "openai-compat provider requires api_url",
        ));
    }

    if !(0.0..=2.0).contains(&m.temperature) {
        return Err(invalid(
            "model.temperature",
            format!("temperature {} is out of range; must be between 0.0 and 2.0", m.temperature),
        ));
    }

    if m.max_tokens == 0 || m.max_tokens > MAX_TOKENS_UPPER_BOUND {
        return Err(invalid(
            "model.max_tokens",
            format!("max_tokens must be between 1 and {MAX_TOKENS_UPPER_BOUND}"),
        ));
    }

    Ok(())
}

fn validate_runtime(config: &Config) -> ConfigResult<()> {
    let r = &config.runtime;

    if !SUPPORTED_MODES.contains(&r.default_mode.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "runtime.default_mode",
            format!(
                "unknown mode '{}'; expected one of: {}",
                r.default_mode,
                SUPPORTED_MODES.join(", ")
            ),
        ));
    }

    if r.max_rounds == 0 || r.max_rounds > MAX_ROUNDS_UPPER_BOUND {
        return Err(invalid(
            "runtime.max_rounds",
            format!("max_rounds must be between 1 and {MAX_ROUNDS_UPPER_BOUND}"),
        ));
    }

    if r.max_binding_failures == 0 {
        return Err(invalid(
            "runtime.max_binding_failures",
            "max_binding_failures must be at least 1",
        ));
    }

    Ok(())
}

fn validate_retrieval(config: &Config) -> ConfigResult<()> {
    let r = &config.retrieval;

    if r.k == 0 {
        return Err(invalid("retrieval.k", "k must be at least 1"));
    }

    if !r.score_threshold.is_finite() || r.score_threshold < 0.0 {
        return Err(invalid(
            "retrieval.score_threshold",
            "score_threshold must be a finite non-negative distance",
        ));
    }

    if r.web_search && r.web_search_results == 0 {
        return Err(invalid(
            "retrieval.web_search_results",
            "web_search_results must be at least 1 when web_search is enabled",
        ));
    }

    Ok(())
}

fn validate_skills(config: &Config) -> ConfigResult<()> {
    if config.skills.root.as_os_str().is_empty() {
        return Err(invalid("skills.root", "skills root must not be empty"));
    }
    if config.skills.command_timeout_secs == 0 {
        return Err(invalid(
            "skills.command_timeout_secs",
            "command_timeout_secs must be at least 1",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !SUPPORTED_LOG_LEVELS.contains(&l.level.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!("unknown level '{}'", l.level),
        ));
    }
    if !SUPPORTED_LOG_FORMATS.contains(&l.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                SUPPORTED_LOG_FORMATS.join(", ")
            ),
        ));
    }
    if !SUPPORTED_LOG_TARGETS.contains(&l.target.as_str()) {
        return Err(invalid(
            "logging.target",
            format!("unknown target '{}'", l.target),
        ));
    }
    if l.target == "file" && l.directory.is_none() {
        return Err(invalid(
            "logging.directory",
            "file logging requires a directory",
        ));
    }
    Ok(())
}
