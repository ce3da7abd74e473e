//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` as the base
//! 2. Merge `~/.conduit/config.toml` (user)
//! 3. Merge `{workspace}/.conduit/config.toml` (workspace)
//! 4. Merge an explicit `--config` file, if given
//! 5. Apply env var fallbacks for fields no file set
//! 6. Resolve `${VAR}` references, deserialize, validate

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{
    apply_env_fallbacks, collect_env_vars, resolve_env_references,
    resolve_env_references_restricted,
};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum accepted config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Directory name holding config under home and workspace roots.
pub const CONFIG_DIR_NAME: &str = ".conduit";

/// A loaded configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Files that were merged, in precedence order.
    pub loaded_files: Vec<String>,
}

/// Where to look for config files.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions<'a> {
    /// Workspace root; `None` skips the workspace layer.
    pub workspace_root: Option<&'a Path>,
    /// Directory used instead of `~/.conduit`.
    pub home_override: Option<&'a Path>,
    /// Extra file merged last, e.g. from `--config`. Must exist.
    pub explicit_file: Option<&'a Path>,
}

/// Load the layered configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable, oversized or
/// malformed, or if the merged configuration fails validation.
pub fn load(options: &LoadOptions<'_>) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();

    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // User layer.
    let user_dir = match options.home_override {
        Some(dir) => dir.to_path_buf(),
        None => home_directory()?.join(CONFIG_DIR_NAME),
    };
    let user_path = user_dir.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut field_sources);
        info!(path = %user_path.display(), "loaded user config");
        loaded_files.push(user_path.display().to_string());
    }

    // Workspace layer. References only see CONDUIT_* variables.
    if let Some(ws_root) = options.workspace_root {
        let ws_path = ws_root.join(CONFIG_DIR_NAME).join("config.toml");
        if let Some(mut overlay) = try_load_file(&ws_path)? {
            resolve_env_references_restricted(&mut overlay, &env_vars);
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::Workspace,
                &mut field_sources,
            );
            info!(path = %ws_path.display(), "loaded workspace config");
            loaded_files.push(ws_path.display().to_string());
        }
    }

    if let Some(path) = options.explicit_file {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded explicit config");
        loaded_files.push(path.display().to_string());
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    resolve_env_references(&mut merged, &env_vars);
    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load one file on top of the embedded defaults, without other layers or
/// environment fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    crate::merge::deep_merge(&mut merged, &overlay);

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Read and parse a file, returning `None` if it does not exist.
///
/// A single read, with the size checked afterwards, avoids a race between
/// stat and read.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_deserialize() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.runtime.default_mode, "auto");
        assert_eq!(config.runtime.max_rounds, 8);
        assert_eq!(config.retrieval.k, 4);
        assert!(validate::validate(&config).is_ok());
    }

    #[test]
    fn test_workspace_overrides_user() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        write(home.path(), "config.toml", "[runtime]\nmax_rounds = 5\nmax_history = 4\n");
        write(ws.path(), ".conduit/config.toml", "[runtime]\nmax_rounds = 3\n");

        let resolved = load(&LoadOptions {
            workspace_root: Some(ws.path()),
            home_override: Some(home.path()),
            explicit_file: None,
        })
        .unwrap();

        assert_eq!(resolved.config.runtime.max_rounds, 3);
        assert_eq!(resolved.config.runtime.max_history, 4);
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("runtime.max_rounds"),
            Some(&ConfigLayer::Workspace)
        );
        assert_eq!(
            resolved.field_sources.get("retrieval.k"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_explicit_file_wins_and_must_exist() {
        let home = tempfile::tempdir().unwrap();
        let file = write(home.path(), "alt.toml", "[retrieval]\nk = 9\n");

        let resolved = load(&LoadOptions {
            workspace_root: None,
            home_override: Some(home.path()),
            explicit_file: Some(&file),
        })
        .unwrap();
        assert_eq!(resolved.config.retrieval.k, 9);

        let missing = home.path().join("nope.toml");
        let err = load(&LoadOptions {
            workspace_root: None,
            home_override: Some(home.path()),
            explicit_file: Some(&missing),
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let home = tempfile::tempdir().unwrap();
        write(home.path(), "config.toml", "[model]\ntemperature = 3.0\n");
        let err = load(&LoadOptions {
            workspace_root: None,
            home_override: Some(home.path()),
            explicit_file: None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.toml", "[model\n");
        assert!(matches!(load_file(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_file_layers_on_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c.toml", "[skills]\nroot = \"bundles\"\n");
        let config = load_file(&path).unwrap();
        assert_eq!(config.skills.root, PathBuf::from("bundles"));
        assert_eq!(config.runtime.max_rounds, 8);
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        let path = write(dir.path(), "huge.toml", &data);
        assert!(matches!(
            try_load_file(&path),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        assert!(
            try_load_file(Path::new("/nonexistent/conduit/config.toml"))
                .unwrap()
                .is_none()
        );
    }
}
