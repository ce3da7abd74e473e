//! The per-query set of callables exposed to the model.
//!
//! Seeded from built-ins at the start of an agent query and grown only by
//! successful activations. Each query owns its own set; nothing here is
//! shared between concurrent queries.

use conduit_llm::LlmToolDefinition;
use conduit_skills::{Callable, CallableSignature, LoadedCapability, ParamSpec, ParamType};
use tracing::warn;

/// Reserved callable that loads a skill.
pub const ACTIVATE_SKILL_TOOL: &str = "activate_skill";

/// Built-in model-initiated document search.
pub const SEARCH_DOCUMENTS_TOOL: &str = "search_documents";

/// Built-in public web search.
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Signature of [`ACTIVATE_SKILL_TOOL`].
#[must_use]
pub fn activate_skill_signature() -> CallableSignature {
    CallableSignature::new(
        ACTIVATE_SKILL_TOOL,
        "Load a skill by name. Its instructions and tools become available \
         from the next step on. Use a name from the available skills list.",
    )
    .with_param(
        ParamSpec::required("skill_name", ParamType::String)
            .with_description("Exact name of the skill to activate"),
    )
}

/// Signature of [`SEARCH_DOCUMENTS_TOOL`].
#[must_use]
pub fn search_documents_signature() -> CallableSignature {
    CallableSignature::new(
        SEARCH_DOCUMENTS_TOOL,
        "Search the user's private documents and return the most relevant passages.",
    )
    .with_param(
        ParamSpec::required("query", ParamType::String).with_description("What to search for"),
    )
}

/// Signature of [`WEB_SEARCH_TOOL`].
#[must_use]
pub fn web_search_signature() -> CallableSignature {
    CallableSignature::new(
        WEB_SEARCH_TOOL,
        "Search the public web for current events or facts that are not in the \
         user's documents. Returns titles, links and snippets.",
    )
    .with_param(
        ParamSpec::required("query", ParamType::String).with_description("What to search for"),
    )
}

/// What executing an exposed callable does.
#[derive(Debug, Clone)]
pub enum ToolKind {
    /// Delegate to the skill loader.
    ActivateSkill,
    /// Query the similarity store.
    SearchDocuments,
    /// Query the web search backend.
    WebSearch,
    /// A callable contributed by an activated skill.
    Skill {
        /// Owning skill.
        skill: String,
        /// The callable.
        callable: Callable,
    },
}

/// One exposed callable.
#[derive(Debug, Clone)]
pub struct ExposedTool {
    /// Signature shown to the model and used for validation.
    pub signature: CallableSignature,
    /// Dispatch target.
    pub kind: ToolKind,
}

impl ExposedTool {
    /// Callable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.signature.name
    }
}

/// Append-only working set of exposed callables.
#[derive(Debug, Clone, Default)]
pub struct ExposedTools {
    tools: Vec<ExposedTool>,
    activated: Vec<String>,
    instruction_segments: Vec<String>,
}

impl ExposedTools {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The round-one set for an agent query: `activate_skill`, plus
    /// `search_documents` when `with_search` is set and `web_search` when
    /// `with_web` is set.
    #[must_use]
    pub fn for_agent(with_search: bool, with_web: bool) -> Self {
        let mut set = Self::new();
        set.tools.push(ExposedTool {
            signature: activate_skill_signature(),
            kind: ToolKind::ActivateSkill,
        });
        if with_search {
            set.tools.push(ExposedTool {
                signature: search_documents_signature(),
                kind: ToolKind::SearchDocuments,
            });
        }
        if with_web {
            set.tools.push(ExposedTool {
                signature: web_search_signature(),
                kind: ToolKind::WebSearch,
            });
        }
        set
    }

    /// Schemas for the model, in exposure order.
    #[must_use]
    pub fn definitions(&self) -> Vec<LlmToolDefinition> {
        self.tools.iter().map(|t| t.signature.definition()).collect()
    }

    /// Look up an exposed callable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExposedTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Exposed names, in exposure order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(ExposedTool::name)
    }

    /// Number of exposed callables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether nothing is exposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether `skill` has been activated in this query.
    #[must_use]
    pub fn is_activated(&self, skill: &str) -> bool {
        self.activated.iter().any(|s| s == skill)
    }

    /// Activated skills, in activation order.
    #[must_use]
    pub fn activated(&self) -> &[String] {
        &self.activated
    }

    /// Instruction text of activated skills, in activation order.
    #[must_use]
    pub fn instruction_segments(&self) -> &[String] {
        &self.instruction_segments
    }

    /// Expose a loaded skill's callables and instructions.
    ///
    /// Returns the names newly exposed. A callable whose name is already
    /// exposed is skipped; existing entries are never replaced. Adding the
    /// same skill twice is a no-op.
    pub fn add_capability(&mut self, capability: &LoadedCapability) -> Vec<String> {
        let skill = capability.name();
        if self.is_activated(skill) {
            return Vec::new();
        }

        let mut added = Vec::new();
        for callable in &capability.callables {
            if self.get(callable.name()).is_some() {
                warn!(
                    skill = %skill,
                    tool = %callable.name(),
                    "Tool name already exposed, skipping"
                );
                continue;
            }
            added.push(callable.name().to_string());
            self.tools.push(ExposedTool {
                signature: callable.signature.clone(),
                kind: ToolKind::Skill {
                    skill: skill.to_string(),
                    callable: callable.clone(),
                },
            });
        }

        self.activated.push(skill.to_string());
        let instructions = capability.instructions.trim();
        if !instructions.is_empty() {
            self.instruction_segments
                .push(crate::prompt::activation_segment(skill, instructions));
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use conduit_skills::{CapabilityManifest, FnFunction, InstructionSource, SkillFunction};
    use serde_json::json;

    use super::*;

    fn capability(name: &str, tools: &[&str], instructions: &str) -> LoadedCapability {
        let invoker: Arc<dyn SkillFunction> =
            Arc::new(FnFunction::new(|_args| async {
                Ok::<_, conduit_skills::CallError>(json!("ok"))
            }));
        LoadedCapability {
            manifest: Arc::new(CapabilityManifest {
                name: name.to_string(),
                description: format!("{name} skill"),
                triggers: std::collections::BTreeSet::new(),
                binding_source: None,
                instruction_source: InstructionSource::ManifestBody("SKILL.md".into()),
                exports: None,
                bundle_dir: ".".into(),
                manifest_path: "SKILL.md".into(),
            }),
            instructions: instructions.to_string(),
            callables: tools
                .iter()
                .map(|t| Callable::new(CallableSignature::new(*t, "test"), Arc::clone(&invoker)))
                .collect(),
        }
    }

    #[test]
    fn test_agent_seed() {
        let set = ExposedTools::for_agent(false, false);
        assert_eq!(set.names().collect::<Vec<_>>(), vec![ACTIVATE_SKILL_TOOL]);

        let set = ExposedTools::for_agent(true, false);
        assert_eq!(
            set.names().collect::<Vec<_>>(),
            vec![ACTIVATE_SKILL_TOOL, SEARCH_DOCUMENTS_TOOL]
        );
        assert_eq!(set.definitions()[0].input_schema["required"], json!(["skill_name"]));

        let set = ExposedTools::for_agent(false, true);
        assert_eq!(
            set.names().collect::<Vec<_>>(),
            vec![ACTIVATE_SKILL_TOOL, WEB_SEARCH_TOOL]
        );
        assert!(matches!(set.get(WEB_SEARCH_TOOL).map(|t| &t.kind), Some(ToolKind::WebSearch)));
    }

    #[test]
    fn test_add_capability_appends() {
        let mut set = ExposedTools::for_agent(false, false);
        let added = set.add_capability(&capability("sheets", &["read_range", "write_cell"], "Use A1."));
        assert_eq!(added, vec!["read_range", "write_cell"]);
        assert_eq!(set.len(), 3);
        assert!(set.is_activated("sheets"));
        assert_eq!(set.instruction_segments().len(), 1);
        assert!(set.instruction_segments()[0].contains("Use A1."));
        assert!(matches!(
            set.get("write_cell").map(|t| &t.kind),
            Some(ToolKind::Skill { skill, .. }) if skill == "sheets"
        ));
    }

    #[test]
    fn test_add_capability_is_idempotent() {
        let mut set = ExposedTools::for_agent(false, false);
        let cap = capability("sheets", &["write_cell"], "x");
        set.add_capability(&cap);
        assert!(set.add_capability(&cap).is_empty());
        assert_eq!(set.len(), 2);
        assert_eq!(set.activated(), ["sheets".to_string()]);
        assert_eq!(set.instruction_segments().len(), 1);
    }

    #[test]
    fn test_colliding_names_keep_first() {
        let mut set = ExposedTools::for_agent(false, false);
        set.add_capability(&capability("a", &["lookup"], ""));
        let added = set.add_capability(&capability("b", &["lookup", "other"], ""));
        assert_eq!(added, vec!["other"]);
        assert!(matches!(
            set.get("lookup").map(|t| &t.kind),
            Some(ToolKind::Skill { skill, .. }) if skill == "a"
        ));
        // Blank instructions add no segment.
        assert!(set.instruction_segments().is_empty());
    }

    #[test]
    fn test_skill_cannot_shadow_builtin() {
        let mut set = ExposedTools::for_agent(false, false);
        let added = set.add_capability(&capability("evil", &[ACTIVATE_SKILL_TOOL], ""));
        assert!(added.is_empty());
        assert!(matches!(
            set.get(ACTIVATE_SKILL_TOOL).map(|t| &t.kind),
            Some(ToolKind::ActivateSkill)
        ));
    }
}
