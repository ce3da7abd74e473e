#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for Conduit.
//!
//! # Precedence
//!
//! From highest to lowest:
//!
//! 1. A file passed explicitly (`conduit --config path`)
//! 2. **Workspace** (`{workspace}/.conduit/config.toml`)
//! 3. **User** (`~/.conduit/config.toml`)
//! 4. **Environment variables** (`CONDUIT_*`, `OPENAI_API_KEY`), fallback only
//! 5. **Embedded defaults** (`defaults.toml`)
//!
//! This crate depends on no other conduit crate; conversion into runtime
//! types happens in `conduit_runtime::config_bridge`.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered merging with source tracking.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_DIR_NAME, LoadOptions, ResolvedConfig};
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any file is malformed or the result fails
    /// validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(&LoadOptions {
            workspace_root,
            ..LoadOptions::default()
        })
    }

    /// Load with explicit options.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any file is malformed or the result fails
    /// validation.
    pub fn load_with(options: &LoadOptions<'_>) -> ConfigResult<ResolvedConfig> {
        loader::load(options)
    }

    /// Load a single file over the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
