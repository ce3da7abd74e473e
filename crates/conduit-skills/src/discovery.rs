//! Skill bundle discovery.
//!
//! Scans one level of sub-directories under a skills root for `SKILL.md`
//! manifests. Bundles are visited in sorted directory-name order so that
//! duplicate resolution and listing order do not depend on the filesystem.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{DiscoveryError, SkillError, SkillResult};
use crate::manifest::parse_manifest;
use crate::registry::SkillIndex;

/// Standard skill manifest file name.
pub const MANIFEST_FILE_NAME: &str = "SKILL.md";

/// Outcome of scanning a skills root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Successfully indexed capabilities.
    pub index: SkillIndex,
    /// Per-bundle problems. Each rejected bundle appears exactly once.
    pub errors: Vec<DiscoveryError>,
}

/// Discover all bundles under `root`.
///
/// A missing root yields an empty index. Malformed and duplicate bundles are
/// excluded from the index and reported in [`Discovery::errors`]; discovery
/// of their siblings continues.
///
/// # Errors
///
/// Returns [`SkillError::RootUnreadable`] if `root` exists but cannot be
/// listed.
pub fn discover(root: &Path) -> SkillResult<Discovery> {
    let bundle_dirs = match list_bundle_dirs(root) {
        Ok(dirs) => dirs,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %root.display(), "Skills root does not exist, no skills available");
            return Ok(Discovery::default());
        },
        Err(e) => {
            return Err(SkillError::RootUnreadable {
                path: root.to_path_buf(),
                source: e,
            });
        },
    };

    let mut discovery = Discovery::default();

    for dir in bundle_dirs {
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            debug!(path = %dir.display(), "Skipping directory without SKILL.md");
            continue;
        }

        let manifest = match parse_manifest(&manifest_path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Rejected skill manifest");
                discovery.errors.push(e);
                continue;
            },
        };

        let name = manifest.name.clone();
        if let Err(e) = discovery.index.insert(manifest) {
            warn!(skill = %name, error = %e, "Rejected duplicate skill");
            discovery.errors.push(e);
            continue;
        }
        debug!(skill = %name, path = %manifest_path.display(), "Indexed skill");
    }

    info!(
        root = %root.display(),
        count = discovery.index.len(),
        rejected = discovery.errors.len(),
        "Discovered skills"
    );
    Ok(discovery)
}

fn list_bundle_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(root)?.map(|entry| entry.map(|e| e.path()));
    Ok(bundle_dirs(root, entries))
}

/// Keep the directories among `entries`, sorted. An entry that cannot be
/// read is logged and skipped so its siblings are still discovered.
fn bundle_dirs(
    root: &Path,
    entries: impl IntoIterator<Item = std::io::Result<PathBuf>>,
) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable skills root entry");
                None
            },
        })
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}
