//! In-memory skill index and the shared registry.
//!
//! The registry publishes an immutable [`SkillIndex`] snapshot. Readers take
//! an `Arc` to the current snapshot without locking; `rediscover` builds a
//! complete new index and swaps it in atomically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::discovery::discover;
use crate::error::{DiscoveryError, SkillResult};
use crate::manifest::CapabilityManifest;

/// Name and description of an indexed capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSummary {
    /// Capability name.
    pub name: String,
    /// Short description.
    pub description: String,
}

/// Insertion-ordered map of `name -> manifest`.
#[derive(Debug, Clone, Default)]
pub struct SkillIndex {
    entries: Vec<Arc<CapabilityManifest>>,
    by_name: HashMap<String, usize>,
}

impl SkillIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::DuplicateCapability`] if the name is already
    /// present; the existing entry is kept.
    pub fn insert(&mut self, manifest: CapabilityManifest) -> Result<(), DiscoveryError> {
        if let Some(&idx) = self.by_name.get(&manifest.name) {
            let existing = self
                .entries
                .get(idx)
                .map(|m| m.manifest_path.clone())
                .unwrap_or_default();
            return Err(DiscoveryError::DuplicateCapability {
                name: manifest.name,
                path: manifest.manifest_path,
                existing,
            });
        }
        self.by_name.insert(manifest.name.clone(), self.entries.len());
        self.entries.push(Arc::new(manifest));
        Ok(())
    }

    /// Look up a manifest by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<CapabilityManifest>> {
        self.by_name.get(name).and_then(|&i| self.entries.get(i))
    }

    /// Whether `name` is indexed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// `(name, description)` pairs in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<SkillSummary> {
        self.entries
            .iter()
            .map(|m| SkillSummary {
                name: m.name.clone(),
                description: m.description.clone(),
            })
            .collect()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|m| m.name.as_str())
    }

    /// Manifests in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CapabilityManifest>> {
        self.entries.iter()
    }

    /// Names of capabilities whose trigger keywords occur in `query`.
    #[must_use]
    pub fn suggest(&self, query: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|m| m.matches_trigger(query))
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Number of indexed capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide registry of discovered skills.
#[derive(Debug)]
pub struct SkillRegistry {
    root: Option<PathBuf>,
    index: ArcSwap<SkillIndex>,
}

impl SkillRegistry {
    /// Discover skills under `root` and build a registry.
    ///
    /// Returns the registry together with per-bundle discovery errors.
    ///
    /// # Errors
    ///
    /// Returns an error only when the root exists but cannot be read.
    pub fn discover(root: impl Into<PathBuf>) -> SkillResult<(Self, Vec<DiscoveryError>)> {
        let root = root.into();
        let discovery = discover(&root)?;
        let registry = Self {
            root: Some(root),
            index: ArcSwap::from_pointee(discovery.index),
        };
        Ok((registry, discovery.errors))
    }

    /// Build a registry around a prepared index (no backing root).
    #[must_use]
    pub fn from_index(index: SkillIndex) -> Self {
        Self {
            root: None,
            index: ArcSwap::from_pointee(index),
        }
    }

    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_index(SkillIndex::new())
    }

    /// Root directory, if the registry was discovered from disk.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Current snapshot. Stays valid even if the registry is rediscovered.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SkillIndex> {
        self.index.load_full()
    }

    /// Look up a manifest in the current snapshot.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CapabilityManifest>> {
        self.index.load().get(name).cloned()
    }

    /// `(name, description)` pairs of the current snapshot.
    #[must_use]
    pub fn list(&self) -> Vec<SkillSummary> {
        self.index.load().list()
    }

    /// Number of indexed capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.load().len()
    }

    /// Whether no capability is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.load().is_empty()
    }

    /// Re-scan the root and atomically replace the index.
    ///
    /// Registries built with [`from_index`](Self::from_index) keep their
    /// index and report no errors.
    ///
    /// # Errors
    ///
    /// Returns an error when the root cannot be read; the previous index is
    /// kept in that case.
    pub fn rediscover(&self) -> SkillResult<Vec<DiscoveryError>> {
        let Some(root) = self.root.as_deref() else {
            return Ok(Vec::new());
        };
        let discovery = discover(root)?;
        info!(count = discovery.index.len(), "Replacing skill index");
        self.index.store(Arc::new(discovery.index));
        Ok(discovery.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::InstructionSource;

    fn manifest(name: &str, triggers: &[&str]) -> CapabilityManifest {
        let dir = PathBuf::from(format!("/skills/{name}"));
        CapabilityManifest {
            name: name.to_string(),
            description: format!("{name} description"),
            triggers: triggers.iter().map(ToString::to_string).collect(),
            binding_source: None,
            instruction_source: InstructionSource::ManifestBody(dir.join("SKILL.md")),
            exports: None,
            manifest_path: dir.join("SKILL.md"),
            bundle_dir: dir,
        }
    }

    #[test]
    fn test_index_rejects_duplicates() {
        let mut index = SkillIndex::new();
        index.insert(manifest("x", &[])).unwrap();
        let err = index.insert(manifest("x", &["other"])).unwrap_err();
        assert!(matches!(err, DiscoveryError::DuplicateCapability { ref name, .. } if name == "x"));
        assert_eq!(index.len(), 1);
        assert!(index.get("x").unwrap().triggers.is_empty());
    }

    #[test]
    fn test_suggest_by_trigger() {
        let mut index = SkillIndex::new();
        index.insert(manifest("google-sheets", &["sheet"])).unwrap();
        index.insert(manifest("weather", &["forecast"])).unwrap();
        assert_eq!(index.suggest("write to my sheet"), ["google-sheets"]);
        assert!(index.suggest("hello").is_empty());
    }

    #[test]
    fn test_snapshot_survives_rediscover() {
        let root = tempfile::tempdir().unwrap();
        let bundle = root.path().join("one");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("SKILL.md"), "---\nname: one\ndescription: d\n---\n").unwrap();

        let (registry, errors) = SkillRegistry::discover(root.path()).unwrap();
        assert!(errors.is_empty());
        let before = registry.snapshot();

        let bundle = root.path().join("two");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("SKILL.md"), "---\nname: two\ndescription: d\n---\n").unwrap();
        registry.rediscover().unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("two").is_some());
    }

    #[test]
    fn test_from_index_rediscover_is_noop() {
        let mut index = SkillIndex::new();
        index.insert(manifest("a", &[])).unwrap();
        let registry = SkillRegistry::from_index(index);
        assert!(registry.rediscover().unwrap().is_empty());
        assert_eq!(registry.list()[0].name, "a");
        assert!(registry.root().is_none());
    }
}
