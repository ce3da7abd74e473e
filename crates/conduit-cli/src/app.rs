//! Wiring from configuration to a ready [`Orchestrator`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use conduit_config::Config;
use conduit_llm::LlmProvider;
use conduit_retrieval::MemoryStore;
use conduit_runtime::{Orchestrator, config_bridge};
use conduit_skills::{SkillLoader, SkillRegistry};
use tracing::{info, warn};

use crate::theme::Theme;

/// The orchestrator as the CLI runs it.
pub(crate) type CliOrchestrator = Orchestrator<Box<dyn LlmProvider>>;

/// Everything a command needs.
pub(crate) struct App {
    pub(crate) orchestrator: CliOrchestrator,
    pub(crate) model: String,
    pub(crate) skills_root: PathBuf,
    pub(crate) passages: usize,
}

impl App {
    /// Build the provider, skill loader, document store and web search.
    pub(crate) fn build(config: &Config, workspace_root: &Path, docs: &[PathBuf]) -> Result<Self> {
        let provider = config_bridge::build_provider(config)
            .context("Failed to configure the inference provider")?;
        let model = provider.model().to_string();

        let skills_root = config_bridge::skills_root(config, workspace_root);
        let (registry, problems) = SkillRegistry::discover(&skills_root)
            .with_context(|| format!("Failed to scan skills in {}", skills_root.display()))?;
        for problem in &problems {
            warn!(error = %problem, "Skipped skill bundle");
            eprintln!("{}", Theme::warning(&problem.to_string()));
        }

        let loader = SkillLoader::new(Arc::new(registry))
            .with_command_timeout(config_bridge::command_timeout(config));

        let mut orchestrator = Orchestrator::new(
            provider,
            Arc::new(loader),
            config_bridge::to_runtime_config(config),
        );
        if let Some(web) = config_bridge::build_web_search(config) {
            info!(backend = web.name(), "Web search enabled for agent mode");
            orchestrator = orchestrator.with_web_search(web);
        }

        let mut passages = 0usize;
        if !docs.is_empty() {
            let store = MemoryStore::new();
            for path in docs {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read document {}", path.display()))?;
                let added = store.add_document(&path.display().to_string(), &text);
                passages = passages.saturating_add(added);
                info!(path = %path.display(), passages = added, "Indexed document");
            }
            orchestrator = orchestrator.with_store(Arc::new(store));
        }

        Ok(Self {
            orchestrator,
            model,
            skills_root,
            passages,
        })
    }
}
