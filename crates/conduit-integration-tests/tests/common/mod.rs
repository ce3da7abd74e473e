//! Shared wiring for integration tests.

use std::sync::Arc;

use conduit_retrieval::SimilarityStore;
use conduit_runtime::{Orchestrator, RuntimeConfig};
use conduit_skills::{SkillLoader, SkillRegistry};
use conduit_test::{MockLlmProvider, MockLlmTurn, SkillBundleFixture, setup_test_logging};
use tokio_util::sync::CancellationToken;

/// An orchestrator over a temporary skills root and a scripted model.
///
/// The fixture is held so the skills root outlives the orchestrator.
#[allow(dead_code)]
pub struct Harness {
    /// Orchestrator under test.
    pub orchestrator: Orchestrator<MockLlmProvider>,
    /// Skills root and native sheet backend.
    pub fixture: SkillBundleFixture,
}

#[allow(dead_code)]
impl Harness {
    /// Build over `fixture` with default configuration.
    pub fn new(fixture: SkillBundleFixture, turns: Vec<MockLlmTurn>) -> Self {
        Self::with_config(fixture, turns, RuntimeConfig::default())
    }

    /// Build over `fixture` with `config`.
    pub fn with_config(
        fixture: SkillBundleFixture,
        turns: Vec<MockLlmTurn>,
        config: RuntimeConfig,
    ) -> Self {
        setup_test_logging("conduit_runtime=debug,conduit_skills=debug");
        let (registry, problems) =
            SkillRegistry::discover(fixture.root()).expect("skills root readable");
        assert!(problems.is_empty(), "unexpected discovery problems: {problems:?}");
        let loader = SkillLoader::new(Arc::new(registry)).with_natives(fixture.natives());
        let orchestrator =
            Orchestrator::new(MockLlmProvider::new(turns), Arc::new(loader), config);
        Self {
            orchestrator,
            fixture,
        }
    }

    /// Build with no skills.
    pub fn bare(turns: Vec<MockLlmTurn>) -> Self {
        Self::new(SkillBundleFixture::new(), turns)
    }

    /// Attach a similarity store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SimilarityStore>) -> Self {
        self.orchestrator = self.orchestrator.with_store(store);
        self
    }

    /// The scripted model.
    pub fn llm(&self) -> &MockLlmProvider {
        self.orchestrator.llm()
    }
}

/// A token nobody cancels.
#[allow(dead_code)]
pub fn no_cancel() -> CancellationToken {
    CancellationToken::new()
}
