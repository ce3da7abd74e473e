//! Environment variable fallbacks and `${VAR}` references.
//!
//! Environment variables are a fallback, not an override: they only fill
//! fields that no config file set.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Environment variable to dotted field path.
const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("CONDUIT_MODEL_PROVIDER", "model.provider"),
    ("CONDUIT_MODEL", "model.model"),
    ("CONDUIT_MODEL_API_KEY", "model.api_key"),
    ("CONDUIT_MODEL_API_URL", "model.api_url"),
    ("OPENAI_API_KEY", "model.api_key"),
    ("CONDUIT_DEFAULT_MODE", "runtime.default_mode"),
    ("CONDUIT_MAX_ROUNDS", "runtime.max_rounds"),
    ("CONDUIT_REQUEST_TIMEOUT_SECS", "runtime.request_timeout_secs"),
    ("CONDUIT_SCORE_THRESHOLD", "retrieval.score_threshold"),
    ("CONDUIT_WEB_SEARCH", "retrieval.web_search"),
    ("CONDUIT_SKILLS_DIR", "skills.root"),
    ("CONDUIT_LOG_LEVEL", "logging.level"),
];

/// Apply environment fallbacks to fields no file layer set.
///
/// Earlier mappings win when two variables target the same field. Returns
/// the number of variables applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for (var_name, field_path) in ENV_MAPPINGS {
        if sources
            .get(*field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            continue;
        }

        if let Some(val) = env_vars.get(*var_name).filter(|v| !v.is_empty()) {
            debug!(var = var_name, field = field_path, "applying env var fallback");
            set_field_from_string(merged, field_path, val);
            sources.insert((*field_path).to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Resolve `${VAR}` references for a workspace overlay, restricted to
/// `CONDUIT_*` variables.
pub fn resolve_env_references_restricted<S: ::std::hash::BuildHasher>(
    val: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) {
    let restricted: HashMap<String, String> = env_vars
        .iter()
        .filter(|(k, _)| k.starts_with("CONDUIT_"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    resolve_env_references(val, &restricted);
}

/// Resolve `${VAR}` references within string values. Unresolved references
/// are left as written.
pub fn resolve_env_references<S: ::std::hash::BuildHasher>(
    val: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) {
    match val {
        toml::Value::String(s) => {
            *s = resolve_string_refs(s, env_vars);
        },
        toml::Value::Table(table) => {
            for (_, child) in table.iter_mut() {
                resolve_env_references(child, env_vars);
            }
        },
        toml::Value::Array(arr) => {
            for child in arr.iter_mut() {
                resolve_env_references(child, env_vars);
            }
        },
        _ => {},
    }
}

fn resolve_string_refs<S: ::std::hash::BuildHasher>(
    input: &str,
    env_vars: &HashMap<String, String, S>,
) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                var_name.push(ch);
            }

            if closed && !var_name.is_empty() {
                if let Some(val) = env_vars.get(&var_name) {
                    result.push_str(val);
                } else {
                    debug!(var = var_name, "unresolved env var reference in config");
                    let _ = write!(result, "${{{var_name}}}");
                }
            } else {
                result.push_str("${");
                result.push_str(&var_name);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let toml_val = coerce_to_toml_value(path, val);
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), toml_val);
    }
}

fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if matches!(path, "retrieval.score_threshold" | "model.temperature")
        && let Ok(f) = val.parse::<f64>()
    {
        return toml::Value::Float(f);
    }

    if matches!(
        path,
        "runtime.max_rounds" | "runtime.request_timeout_secs" | "model.max_tokens"
    ) && let Ok(i) = val.parse::<i64>()
    {
        return toml::Value::Integer(i);
    }

    if path == "retrieval.web_search" && let Ok(b) = val.parse::<bool>() {
        return toml::Value::Boolean(b);
    }

    toml::Value::String(val.to_owned())
}

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fallback_fills_unset_field() {
        let mut merged: toml::Value = toml::from_str("[model]\nprovider = \"ollama\"").unwrap();
        let mut sources = FieldSources::new();
        let env = make_env(&[("CONDUIT_LOG_LEVEL", "debug")]);

        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::Environment));
    }

    #[test]
    fn test_fallback_beats_defaults() {
        let mut merged: toml::Value = toml::from_str("[runtime]\ndefault_mode = \"auto\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("runtime.default_mode".to_owned(), ConfigLayer::Defaults);
        let env = make_env(&[("CONDUIT_DEFAULT_MODE", "agent")]);

        apply_env_fallbacks(&mut merged, &mut sources, &env);
        assert_eq!(merged["runtime"]["default_mode"].as_str(), Some("agent"));
    }

    #[test]
    fn test_fallback_skips_file_value() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);
        let env = make_env(&[("CONDUIT_LOG_LEVEL", "debug")]);

        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_first_mapping_wins_for_api_key() {
        let mut merged: toml::Value = toml::from_str("[model]").unwrap();
        let mut sources = FieldSources::new();
        let env = make_env(&[
            ("CONDUIT_MODEL_API_KEY", "conduit-key"),
            ("OPENAI_API_KEY", "openai-key"),
        ]);
        apply_env_fallbacks(&mut merged, &mut sources, &env);
        assert_eq!(merged["model"]["api_key"].as_str(), Some("conduit-key"));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce_to_toml_value("runtime.max_rounds", "5").as_integer(), Some(5));
        assert_eq!(
            coerce_to_toml_value("retrieval.score_threshold", "0.75").as_float(),
            Some(0.75)
        );
        assert_eq!(coerce_to_toml_value("model.model", "llama3").as_str(), Some("llama3"));
        assert_eq!(coerce_to_toml_value("retrieval.web_search", "false").as_bool(), Some(false));
    }

    #[test]
    fn test_resolve_references() {
        let mut val: toml::Value = toml::from_str("[model]\napi_key = \"${MY_KEY}\"\napi_url = \"${MISSING}\"").unwrap();
        resolve_env_references(&mut val, &make_env(&[("MY_KEY", "sk-1")]));
        assert_eq!(val["model"]["api_key"].as_str(), Some("sk-1"));
        assert_eq!(val["model"]["api_url"].as_str(), Some("${MISSING}"));
    }

    #[test]
    fn test_restricted_references() {
        let mut val: toml::Value =
            toml::from_str("[runtime]\nsystem_prompt = \"${HOME} ${CONDUIT_NAME}\"").unwrap();
        let env = make_env(&[("HOME", "/home/u"), ("CONDUIT_NAME", "bot")]);
        resolve_env_references_restricted(&mut val, &env);
        assert_eq!(val["runtime"]["system_prompt"].as_str(), Some("${HOME} bot"));
    }
}
