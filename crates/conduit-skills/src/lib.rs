//! Conduit Skills - capability bundles with progressive disclosure.
//!
//! A skill is a directory holding a `SKILL.md` manifest (YAML frontmatter
//! plus an instruction body) and an optional `tools.toml` binding source.
//!
//! - [`SkillRegistry`] discovers bundles and keeps only their metadata
//!   (name, description, triggers) resident.
//! - [`SkillLoader`] reads the full instructions and resolves callables on
//!   first use, once per name even under concurrent requests.
//! - [`Callable`] pairs a typed [`CallableSignature`] with a
//!   [`SkillFunction`], either a subprocess ([`CommandFunction`]) or a
//!   host-registered handler ([`NativeBindings`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use conduit_skills::{SkillLoader, SkillRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (registry, problems) = SkillRegistry::discover("skills")?;
//! for p in &problems {
//!     eprintln!("skipped bundle: {p}");
//! }
//! let loader = SkillLoader::new(Arc::new(registry));
//! let sheets = loader.load("google-sheets").await?;
//! println!("{} callables", sheets.callables.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bindings;
pub mod callable;
pub mod command;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod registry;

pub use callable::{
    Callable, CallableSignature, FnFunction, NativeBindings, ParamSpec, ParamType, SkillFunction,
    render_output,
};
pub use command::CommandFunction;
pub use discovery::{Discovery, MANIFEST_FILE_NAME, discover};
pub use error::{
    BindingError, CallError, CallResult, DiscoveryError, LoadError, LoadResult, SkillError,
    SkillResult,
};
pub use loader::{LoadedCapability, SkillLoader};
pub use manifest::{CapabilityManifest, InstructionSource, parse_manifest};
pub use registry::{SkillIndex, SkillRegistry, SkillSummary};
