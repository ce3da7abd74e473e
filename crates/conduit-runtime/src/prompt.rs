//! System prompt assembly.
//!
//! Before activation the model sees only each skill's name and description.
//! Full instructions are appended as separate segments once a skill is
//! activated, and only for the rounds that follow.

use std::fmt::Write as _;

use conduit_skills::SkillIndex;

use crate::tools::ACTIVATE_SKILL_TOOL;

/// Used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer clearly and \
     concisely. If you do not know the answer, say so.";

/// Resolve the configured base prompt, falling back to the default.
#[must_use]
pub fn base_prompt(configured: &str) -> &str {
    if configured.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT
    } else {
        configured
    }
}

/// Compact skill listing: one `name: description` line per skill, plus a
/// line naming skills whose trigger keywords occur in `query`.
#[must_use]
pub fn skill_catalog(index: &SkillIndex, query: &str) -> String {
    if index.is_empty() {
        return "No skills are installed.".to_string();
    }

    let mut out = String::from("Available skills:");
    for skill in index.list() {
        let _ = write!(out, "\n- **{}**: {}", skill.name, skill.description);
    }

    let suggested = index.suggest(query);
    if !suggested.is_empty() {
        let _ = write!(out, "\n\nSuggested for this request: {}", suggested.join(", "));
    }
    out
}

/// Segment appended after `skill` is activated.
#[must_use]
pub fn activation_segment(skill: &str, instructions: &str) -> String {
    format!("## Skill: {skill}\n\n{instructions}")
}

/// System prompt for one agent round.
#[must_use]
pub fn agent_system_prompt(base: &str, catalog: &str, segments: &[String]) -> String {
    let mut out = format!(
        "{base}\n\n\
         You can extend yourself with skills. Call `{ACTIVATE_SKILL_TOOL}` with a skill \
         name to load its instructions and tools; they become available on your next \
         step. Only activate a skill when the request needs it.\n\n\
         {catalog}"
    );
    for segment in segments {
        out.push_str("\n\n");
        out.push_str(segment);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use conduit_skills::{CapabilityManifest, InstructionSource};

    use super::*;

    fn manifest(name: &str, description: &str, triggers: &[&str]) -> CapabilityManifest {
        CapabilityManifest {
            name: name.to_string(),
            description: description.to_string(),
            triggers: triggers.iter().map(|t| (*t).to_string()).collect::<BTreeSet<_>>(),
            binding_source: None,
            instruction_source: InstructionSource::ManifestBody(format!("{name}/SKILL.md").into()),
            exports: None,
            bundle_dir: name.into(),
            manifest_path: format!("{name}/SKILL.md").into(),
        }
    }

    fn index() -> SkillIndex {
        let mut index = SkillIndex::new();
        index
            .insert(manifest("google-sheets", "Read and write spreadsheets", &["spreadsheet", "sheet"]))
            .unwrap();
        index
            .insert(manifest("weather", "Current conditions by city", &[]))
            .unwrap();
        index
    }

    #[test]
    fn test_catalog_lists_name_and_description() {
        let catalog = skill_catalog(&index(), "hello");
        assert_eq!(
            catalog,
            "Available skills:\n\
             - **google-sheets**: Read and write spreadsheets\n\
             - **weather**: Current conditions by city"
        );
    }

    #[test]
    fn test_catalog_suggests_by_trigger() {
        let catalog = skill_catalog(&index(), "Add a row to my Spreadsheet");
        assert!(catalog.ends_with("Suggested for this request: google-sheets"));
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(skill_catalog(&SkillIndex::new(), "x"), "No skills are installed.");
    }

    #[test]
    fn test_base_prompt_fallback() {
        assert_eq!(base_prompt("  "), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(base_prompt("Be terse."), "Be terse.");
    }

    #[test]
    fn test_agent_prompt_appends_segments_in_order() {
        let segments = vec![
            activation_segment("a", "first"),
            activation_segment("b", "second"),
        ];
        let prompt = agent_system_prompt("Base.", "Available skills:", &segments);
        assert!(prompt.starts_with("Base."));
        assert!(prompt.contains(ACTIVATE_SKILL_TOOL));
        let a = prompt.find("## Skill: a").unwrap();
        let b = prompt.find("## Skill: b").unwrap();
        assert!(a < b);
    }
}
