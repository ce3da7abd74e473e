//! Skill error types.
//!
//! Three families with different blast radius:
//! - [`DiscoveryError`] is per bundle and never aborts discovery of siblings.
//! - [`LoadError`] is returned from [`SkillLoader::load`](crate::SkillLoader::load);
//!   a rejected binding source surfaces there as a [`BindingError`].
//! - [`CallError`] describes a failed callable invocation and is fed back to
//!   the model as data.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole operation on the skills root.
#[derive(Debug, Error)]
pub enum SkillError {
    /// The skills root exists but cannot be listed.
    #[error("Failed to read skills root {path}: {source}")]
    RootUnreadable {
        /// Root directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Loading a capability failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A bundle that could not be indexed. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The manifest is unreadable, has invalid frontmatter, or lacks a
    /// required field.
    #[error("Malformed manifest at {path}: {reason}")]
    MalformedManifest {
        /// Path to the manifest file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// A second bundle declared a name that is already indexed.
    #[error("Duplicate capability '{name}' at {path} (already declared at {existing})")]
    DuplicateCapability {
        /// The duplicated name.
        name: String,
        /// Manifest that was dropped.
        path: PathBuf,
        /// Manifest that was kept.
        existing: PathBuf,
    },
}

/// Errors from materializing a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No capability with this name is indexed.
    #[error("Capability '{name}' not found")]
    CapabilityNotFound {
        /// Requested name.
        name: String,
    },

    /// The binding source is missing, unparsable, or declares callables that
    /// cannot be resolved.
    #[error("Failed to load bindings for '{name}': {reason}")]
    BindingLoadFailed {
        /// Capability name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// The instruction body could not be read.
    #[error("Failed to read instructions for '{name}' from {path}: {reason}")]
    InstructionsUnavailable {
        /// Capability name.
        name: String,
        /// Instruction file.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
}

/// Why a binding source (`tools.toml`) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The source is not valid TOML or has unknown fields.
    #[error("invalid TOML: {0}")]
    InvalidToml(String),

    /// A tool entry has a blank name.
    #[error("tool with empty name")]
    EmptyName,

    /// Two tool entries share a name.
    #[error("tool '{0}' declared more than once")]
    DuplicateTool(String),

    /// One tool declares the same parameter twice.
    #[error("tool '{tool}' declares parameter '{param}' twice")]
    DuplicateParam {
        /// Tool name.
        tool: String,
        /// Repeated parameter.
        param: String,
    },

    /// A tool names a native handler the host did not register.
    #[error("tool '{tool}' references unknown native handler '{key}'")]
    UnknownNative {
        /// Tool name.
        tool: String,
        /// Native handler key.
        key: String,
    },

    /// A tool declares both `command` and `native`.
    #[error("tool '{0}' declares both `command` and `native`")]
    ConflictingHandlers(String),

    /// A tool declares neither `command` nor `native`.
    #[error("tool '{0}' has no `command` or `native` handler")]
    MissingHandler(String),

    /// The manifest exports a tool the source does not declare.
    #[error("exported tool '{0}' is not declared")]
    UndeclaredExport(String),
}

/// Errors from executing a callable. Always rendered back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The named callable is not in the exposed set.
    #[error("Unknown tool '{name}'")]
    UnknownCallable {
        /// Requested callable name.
        name: String,
    },

    /// A required parameter was not supplied.
    #[error("Tool '{callable}' is missing required argument '{argument}'")]
    MissingArgument {
        /// Callable name.
        callable: String,
        /// Missing parameter.
        argument: String,
    },

    /// Arguments were supplied with the wrong shape or type.
    #[error("Invalid arguments for '{callable}': {reason}")]
    InvalidArguments {
        /// Callable name.
        callable: String,
        /// What is wrong.
        reason: String,
    },

    /// The callable ran and reported failure.
    #[error("Tool '{callable}' failed: {message}")]
    Failed {
        /// Callable name.
        callable: String,
        /// Failure message.
        message: String,
    },

    /// The callable did not finish within its timeout.
    #[error("Tool '{callable}' timed out after {timeout_secs}s")]
    TimedOut {
        /// Callable name.
        callable: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
}

impl LoadError {
    /// Short machine-readable kind, used in traces.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapabilityNotFound { .. } => "capability_not_found",
            Self::BindingLoadFailed { .. } => "binding_load_failed",
            Self::InstructionsUnavailable { .. } => "instructions_unavailable",
        }
    }
}

impl CallError {
    /// Short machine-readable kind, used in traces.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCallable { .. } => "unknown_callable",
            Self::MissingArgument { .. } => "missing_argument",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// Result type for skill-root operations.
pub type SkillResult<T> = Result<T, SkillError>;

/// Result type for capability loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for callable invocation.
pub type CallResult<T> = Result<T, CallError>;
