//! Skill listing command.

use std::path::Path;

use anyhow::{Context, Result};
use conduit_skills::SkillRegistry;
use conduit_telemetry::{RequestContext, RequestGuard};

use crate::theme::Theme;

/// Discover skills under `root` and print them with any problems found.
pub(crate) fn list_skills(root: &Path) -> Result<()> {
    let _guard = RequestGuard::new(RequestContext::new("cli").with_operation("list_skills"));

    let (registry, problems) = SkillRegistry::discover(root)
        .with_context(|| format!("Failed to scan skills in {}", root.display()))?;

    println!("{}", Theme::header("Skills"));
    println!("{}", Theme::kv("Root", &root.display().to_string()));
    println!("{}", Theme::separator());

    let index = registry.snapshot();
    if index.is_empty() {
        println!("{}", Theme::dimmed("No skills found."));
    }
    for manifest in index.iter() {
        println!("{}", Theme::success(&manifest.name));
        println!("    {}", manifest.description);
        if !manifest.triggers.is_empty() {
            let triggers: Vec<&str> = manifest.triggers.iter().map(String::as_str).collect();
            println!("    {}", Theme::kv("triggers", &triggers.join(", ")));
        }
        if let Some(tools) = &manifest.binding_source {
            println!("    {}", Theme::kv("tools", &tools.display().to_string()));
        }
    }

    for problem in &problems {
        println!("{}", Theme::warning(&problem.to_string()));
    }

    println!("{}", Theme::separator());
    println!(
        "{}",
        Theme::dimmed(&format!(
            "{} skills, {} skipped",
            index.len(),
            problems.len()
        ))
    );
    Ok(())
}
