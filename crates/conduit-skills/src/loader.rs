//! Progressive skill loader.
//!
//! Materializes a capability's instruction text and callables on first use
//! and caches the result for the lifetime of the loader. Concurrent loads of
//! the same uncached name share a single in-flight materialization. A
//! failed load leaves the slot empty so the next caller retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use conduit_llm::LlmToolDefinition;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::bindings::{BindingContext, parse_bindings};
use crate::callable::{Callable, NativeBindings};
use crate::error::{LoadError, LoadResult};
use crate::manifest::{CapabilityManifest, InstructionSource, strip_frontmatter};
use crate::registry::SkillRegistry;

/// A fully materialized capability.
#[derive(Debug)]
pub struct LoadedCapability {
    /// Manifest this was loaded from.
    pub manifest: Arc<CapabilityManifest>,
    /// Full instruction text.
    pub instructions: String,
    /// Callables in declaration order.
    pub callables: Vec<Callable>,
}

impl LoadedCapability {
    /// Capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Look up a callable by name.
    #[must_use]
    pub fn callable(&self, name: &str) -> Option<&Callable> {
        self.callables.iter().find(|c| c.name() == name)
    }

    /// Callable names in declaration order.
    pub fn callable_names(&self) -> impl Iterator<Item = &str> {
        self.callables.iter().map(Callable::name)
    }

    /// Tool definitions for every callable.
    #[must_use]
    pub fn definitions(&self) -> Vec<LlmToolDefinition> {
        self.callables
            .iter()
            .map(|c| c.signature.definition())
            .collect()
    }
}

type Slot = Arc<OnceCell<Arc<LoadedCapability>>>;

/// Memoizing loader keyed by capability name.
pub struct SkillLoader {
    registry: Arc<SkillRegistry>,
    natives: NativeBindings,
    command_timeout: Duration,
    cache: DashMap<String, Slot>,
    materializations: AtomicUsize,
}

impl SkillLoader {
    /// Create a loader over `registry` with no native handlers.
    #[must_use]
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self {
            registry,
            natives: NativeBindings::new(),
            command_timeout: Duration::from_secs(30),
            cache: DashMap::new(),
            materializations: AtomicUsize::new(0),
        }
    }

    /// Set the host-registered native handlers.
    #[must_use]
    pub fn with_natives(mut self, natives: NativeBindings) -> Self {
        self.natives = natives;
        self
    }

    /// Default timeout for command callables.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// The registry this loader resolves names against.
    #[must_use]
    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// Load a capability, reusing the cached value when present.
    ///
    /// # Errors
    ///
    /// [`LoadError::CapabilityNotFound`] if `name` is not indexed,
    /// [`LoadError::BindingLoadFailed`] or
    /// [`LoadError::InstructionsUnavailable`] if its sources cannot be read.
    pub async fn load(&self, name: &str) -> LoadResult<Arc<LoadedCapability>> {
        let manifest = self
            .registry
            .get(name)
            .ok_or_else(|| LoadError::CapabilityNotFound {
                name: name.to_string(),
            })?;

        // Clone the slot out so no map guard is held across the await.
        let slot: Slot = Arc::clone(self.cache.entry(name.to_string()).or_default().value());

        let loaded = slot
            .get_or_try_init(|| self.materialize(manifest))
            .await?;
        Ok(Arc::clone(loaded))
    }

    /// Materialize `name` afresh and atomically replace the cached value.
    ///
    /// Callers holding the previous value keep it; later `load` calls see the
    /// new one. On failure the cache is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn reload(&self, name: &str) -> LoadResult<Arc<LoadedCapability>> {
        let manifest = self
            .registry
            .get(name)
            .ok_or_else(|| LoadError::CapabilityNotFound {
                name: name.to_string(),
            })?;

        let fresh = self.materialize(manifest).await?;
        self.cache
            .insert(name.to_string(), Arc::new(OnceCell::from(Arc::clone(&fresh))));
        info!(skill = %name, "Reloaded skill");
        Ok(fresh)
    }

    /// Drop the cached value for `name`. Returns whether anything was cached.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self
            .cache
            .remove(name)
            .is_some_and(|(_, slot)| slot.initialized());
        if removed {
            debug!(skill = %name, "Unloaded skill");
        }
        removed
    }

    /// Whether `name` is currently materialized.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache.get(name).is_some_and(|slot| slot.initialized())
    }

    /// Names of materialized capabilities, sorted.
    #[must_use]
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cache
            .iter()
            .filter(|e| e.value().initialized())
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Number of source reads performed so far.
    #[must_use]
    pub fn materializations(&self) -> usize {
        self.materializations.load(Ordering::Acquire)
    }

    async fn materialize(
        &self,
        manifest: Arc<CapabilityManifest>,
    ) -> LoadResult<Arc<LoadedCapability>> {
        self.materializations.fetch_add(1, Ordering::AcqRel);
        let name = manifest.name.clone();
        debug!(skill = %name, "Materializing skill");

        let source = manifest.instruction_source.path();
        let raw = tokio::fs::read_to_string(source).await.map_err(|e| {
            LoadError::InstructionsUnavailable {
                name: name.clone(),
                path: source.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        let instructions = match manifest.instruction_source {
            InstructionSource::ManifestBody(_) => strip_frontmatter(&raw).trim().to_string(),
            InstructionSource::File(_) => raw.trim().to_string(),
        };

        let callables = match &manifest.binding_source {
            None => Vec::new(),
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    LoadError::BindingLoadFailed {
                        name: name.clone(),
                        reason: format!("cannot read {}: {e}", path.display()),
                    }
                })?;
                let ctx = BindingContext {
                    natives: &self.natives,
                    default_timeout: self.command_timeout,
                };
                parse_bindings(
                    &content,
                    &manifest.bundle_dir,
                    manifest.exports.as_deref(),
                    &ctx,
                )
                .map_err(|e| {
                    warn!(skill = %name, error = %e, "Skill binding source rejected");
                    LoadError::BindingLoadFailed {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?
            },
        };

        info!(
            skill = %name,
            callables = callables.len(),
            instruction_bytes = instructions.len(),
            "Loaded skill"
        );

        Ok(Arc::new(LoadedCapability {
            manifest,
            instructions,
            callables,
        }))
    }
}

impl std::fmt::Debug for SkillLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillLoader")
            .field("skills", &self.registry.len())
            .field("loaded", &self.loaded_names())
            .field("natives", &self.natives)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}
