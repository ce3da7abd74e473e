//! Capability manifest parsing.
//!
//! A bundle's `SKILL.md` starts with a YAML frontmatter block:
//!
//! ```text
//! ---
//! name: google-sheets
//! description: Read and write cells in Google Sheets
//! triggers: [sheet, spreadsheet, cell]
//! tools_file: tools.toml
//! ---
//! # Google Sheets
//! ...instruction body...
//! ```
//!
//! Discovery reads only the frontmatter. The body after the closing
//! delimiter is the default instruction source and is read by the loader.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::DiscoveryError;

/// Frontmatter delimiter line.
const DELIMITER: &str = "---";

/// Upper bound on frontmatter size; protects against files with no closing
/// delimiter.
const MAX_FRONTMATTER_BYTES: usize = 64 * 1024;

/// Where a capability's full guidance text lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionSource {
    /// The manifest body after the frontmatter.
    ManifestBody(PathBuf),
    /// A separate file inside the bundle.
    File(PathBuf),
}

impl InstructionSource {
    /// Path that will be read.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::ManifestBody(p) | Self::File(p) => p,
        }
    }
}

/// Lightweight, always-resident description of a capability bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityManifest {
    /// Unique name across the registry.
    pub name: String,
    /// Short description shown to users and to the model.
    pub description: String,
    /// Lowercased trigger keywords. A hint only.
    pub triggers: BTreeSet<String>,
    /// Binding source (`tools.toml`); `None` means no callables.
    pub binding_source: Option<PathBuf>,
    /// Full instruction body.
    pub instruction_source: InstructionSource,
    /// Allow-list of callables to export from the binding source.
    pub exports: Option<Vec<String>>,
    /// Directory holding the bundle.
    pub bundle_dir: PathBuf,
    /// The manifest file itself.
    pub manifest_path: PathBuf,
}

impl CapabilityManifest {
    /// Whether any trigger keyword occurs in `query` (case-insensitive,
    /// substring match).
    #[must_use]
    pub fn matches_trigger(&self, query: &str) -> bool {
        if self.triggers.is_empty() {
            return false;
        }
        let query = query.to_lowercase();
        self.triggers.iter().any(|t| query.contains(t.as_str()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default, alias = "trigger_keywords")]
    triggers: Vec<String>,
    tools_file: Option<String>,
    instructions_file: Option<String>,
    tools: Option<Vec<String>>,
}

/// Parse the manifest at `manifest_path`, reading only its frontmatter.
///
/// # Errors
///
/// Returns [`DiscoveryError::MalformedManifest`] when the file cannot be read,
/// the frontmatter is missing or invalid YAML, a required field is absent, or
/// a source reference escapes the bundle directory.
pub fn parse_manifest(manifest_path: &Path) -> Result<CapabilityManifest, DiscoveryError> {
    let malformed = |reason: String| DiscoveryError::MalformedManifest {
        path: manifest_path.to_path_buf(),
        reason,
    };

    let yaml = read_frontmatter(manifest_path).map_err(malformed)?;
    let raw: Frontmatter = if yaml.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(&yaml).map_err(|e| malformed(format!("invalid frontmatter: {e}")))?
    };

    let name = required(raw.name, "name").map_err(malformed)?;
    let description = required(raw.description, "description").map_err(malformed)?;

    let bundle_dir = manifest_path
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf);

    let binding_source = raw
        .tools_file
        .as_deref()
        .map(|r| resolve_ref(&bundle_dir, r, "tools_file"))
        .transpose()
        .map_err(malformed)?;

    let instruction_source = match raw.instructions_file.as_deref() {
        Some(r) => InstructionSource::File(
            resolve_ref(&bundle_dir, r, "instructions_file").map_err(malformed)?,
        ),
        None => InstructionSource::ManifestBody(manifest_path.to_path_buf()),
    };

    let triggers = raw
        .triggers
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(CapabilityManifest {
        name,
        description,
        triggers,
        binding_source,
        instruction_source,
        exports: raw.tools,
        bundle_dir,
        manifest_path: manifest_path.to_path_buf(),
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("missing required field `{field}`")),
    }
}

/// Resolve a bundle-relative reference, rejecting absolute paths and `..`.
fn resolve_ref(bundle_dir: &Path, raw: &str, field: &str) -> Result<PathBuf, String> {
    let rel = Path::new(raw.trim());
    if rel.as_os_str().is_empty() {
        return Err(format!("`{field}` is empty"));
    }
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!("`{field}` must stay inside the bundle: {raw}"));
    }
    Ok(bundle_dir.join(rel))
}

/// Read the YAML between the opening and closing `---` lines without reading
/// the rest of the file.
fn read_frontmatter(path: &Path) -> Result<String, String> {
    let file = std::fs::File::open(path).map_err(|e| format!("cannot open: {e}"))?;
    let mut lines = BufReader::new(file).lines();

    let first = loop {
        match lines.next() {
            Some(Ok(line)) if line.trim().is_empty() => {},
            Some(Ok(line)) => break line,
            Some(Err(e)) => return Err(format!("cannot read: {e}")),
            None => return Err("file is empty".to_string()),
        }
    };
    if first.trim_start_matches('\u{feff}').trim_end() != DELIMITER {
        return Err("missing YAML frontmatter".to_string());
    }

    let mut yaml = String::new();
    for line in lines {
        let line = line.map_err(|e| format!("cannot read: {e}"))?;
        if line.trim_end() == DELIMITER {
            return Ok(yaml);
        }
        if yaml.len().saturating_add(line.len()) > MAX_FRONTMATTER_BYTES {
            return Err("frontmatter exceeds size limit".to_string());
        }
        yaml.push_str(&line);
        yaml.push('\n');
    }
    Err("unterminated frontmatter".to_string())
}

/// Return the body of a manifest, i.e. everything after the frontmatter.
/// Content without frontmatter is returned whole.
#[must_use]
pub fn strip_frontmatter(content: &str) -> &str {
    let content = content.trim_start_matches('\u{feff}');
    let mut offset = 0usize;
    let mut in_frontmatter = false;

    for line in content.split_inclusive('\n') {
        let end = offset.saturating_add(line.len());
        let trimmed = line.trim();
        if !in_frontmatter {
            if trimmed.is_empty() {
                offset = end;
                continue;
            }
            if trimmed != DELIMITER {
                return content;
            }
            in_frontmatter = true;
        } else if trimmed == DELIMITER {
            return content[end..].trim_start_matches(['\r', '\n']);
        }
        offset = end;
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("SKILL.md");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_full_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "---\nname: google-sheets\ndescription: Read and write cells\ntriggers: [Sheet, ' cell ']\ntools_file: tools.toml\ntools: [write_cell]\n---\n# Body\nLong guidance.\n",
        );

        let m = parse_manifest(&path).unwrap();
        assert_eq!(m.name, "google-sheets");
        assert_eq!(m.description, "Read and write cells");
        assert!(m.triggers.contains("sheet"));
        assert!(m.triggers.contains("cell"));
        assert_eq!(m.binding_source, Some(dir.path().join("tools.toml")));
        assert_eq!(m.instruction_source, InstructionSource::ManifestBody(path.clone()));
        assert_eq!(m.exports.as_deref(), Some(&["write_cell".to_string()][..]));
        assert_eq!(m.bundle_dir, dir.path());
    }

    #[test]
    fn test_missing_description_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "---\nname: x\n---\nbody\n");
        let err = parse_manifest(&path).unwrap_err();
        assert!(
            matches!(err, DiscoveryError::MalformedManifest { ref reason, .. } if reason.contains("description"))
        );
    }

    #[test]
    fn test_blank_name_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "---\nname: '   '\ndescription: d\n---\n");
        assert!(parse_manifest(&path).is_err());
    }

    #[test]
    fn test_no_frontmatter_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "# Just markdown\n");
        assert!(parse_manifest(&path).is_err());
    }

    #[test]
    fn test_unterminated_frontmatter_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "---\nname: x\ndescription: y\n");
        let err = parse_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_escaping_refs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "---\nname: x\ndescription: y\ntools_file: ../other/tools.toml\n---\n",
        );
        assert!(parse_manifest(&path).is_err());

        let path = write(
            dir.path(),
            "---\nname: x\ndescription: y\ninstructions_file: /etc/passwd\n---\n",
        );
        assert!(parse_manifest(&path).is_err());
    }

    #[test]
    fn test_separate_instructions_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "---\nname: x\ndescription: y\ninstructions_file: docs/GUIDE.md\n---\n",
        );
        let m = parse_manifest(&path).unwrap();
        assert_eq!(
            m.instruction_source,
            InstructionSource::File(dir.path().join("docs/GUIDE.md"))
        );
        assert!(m.binding_source.is_none());
    }

    #[test]
    fn test_trigger_matching() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "---\nname: x\ndescription: y\ntriggers: [sheet]\n---\n");
        let m = parse_manifest(&path).unwrap();
        assert!(m.matches_trigger("Update the SHEET please"));
        assert!(!m.matches_trigger("hello"));
    }

    #[test]
    fn test_strip_frontmatter() {
        let content = "---\nname: x\ndescription: y\n---\n\n# Title\nBody\n";
        assert_eq!(strip_frontmatter(content), "# Title\nBody\n");
        assert_eq!(strip_frontmatter("# No frontmatter"), "# No frontmatter");
    }
}
