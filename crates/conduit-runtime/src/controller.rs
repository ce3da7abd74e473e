//! Mode controller.
//!
//! | Mode    | Retrieval gate        | Tools                | Model calls |
//! |---------|-----------------------|----------------------|-------------|
//! | `chat`  | skipped               | none                 | one         |
//! | `rag`   | inject any passage    | none                 | one         |
//! | `auto`  | inject if best <= t   | none                 | one         |
//! | `agent` | skipped               | `activate_skill` ... | bounded     |
//!
//! In `agent` mode the model may also call `search_documents` (when a store
//! is attached) and `web_search` (when a web backend is attached).
//!
//! Modes change only through an explicit directive or a per-call override.

use std::sync::Arc;

use conduit_core::{OperatingMode, parse_directive};
use conduit_llm::{LlmProvider, Message};
use conduit_retrieval::context::{
    build_grounded_prompt, distinct_sources, format_context, format_sources,
};
use conduit_retrieval::{
    GateOutcome, RetrievalGate, RetrievedPassage, SimilarityStore, WebSearch,
};
use conduit_skills::{SkillLoader, SkillRegistry};
use conduit_telemetry::RequestContext;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::answer::{Answer, AnswerStatus, Grounding};
use crate::budget::RequestBudget;
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::prompt;
use crate::session::Session;
use crate::tool_loop::{EMPTY_RESPONSE_NOTICE, LoopLimits, ToolLoop};
use crate::trace::ExecutionTrace;

/// Result of handling one user turn.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The turn was a bare directive; the session mode changed.
    ModeChanged(OperatingMode),
    /// The turn was answered.
    Answered(Box<Answer>),
}

struct Retrieved {
    grounding: Grounding,
    passages: Vec<RetrievedPassage>,
}

impl Retrieved {
    fn ungrounded(grounding: Grounding) -> Self {
        Self {
            grounding,
            passages: Vec::new(),
        }
    }
}

/// Routes each query through the components its mode selects.
///
/// Cheap to share behind an `Arc`; every query owns its own history, trace
/// and exposed-tool set.
pub struct Orchestrator<P: LlmProvider> {
    llm: Arc<P>,
    loader: Arc<SkillLoader>,
    store: Option<Arc<dyn SimilarityStore>>,
    web: Option<Arc<dyn WebSearch>>,
    gate: RetrievalGate,
    config: RuntimeConfig,
}

impl<P: LlmProvider> Orchestrator<P> {
    /// Create an orchestrator without a similarity store.
    pub fn new(llm: P, loader: Arc<SkillLoader>, config: RuntimeConfig) -> Self {
        let gate = RetrievalGate::new()
            .with_k(config.retrieval_k)
            .with_threshold(config.score_threshold);
        Self {
            llm: Arc::new(llm),
            loader,
            store: None,
            web: None,
            gate,
            config,
        }
    }

    /// Attach a similarity store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SimilarityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach a web search backend for `agent` mode.
    #[must_use]
    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    /// Runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The inference engine.
    #[must_use]
    pub fn llm(&self) -> &Arc<P> {
        &self.llm
    }

    /// The skill loader.
    #[must_use]
    pub fn loader(&self) -> &Arc<SkillLoader> {
        &self.loader
    }

    /// The skill registry behind the loader.
    #[must_use]
    pub fn registry(&self) -> &Arc<SkillRegistry> {
        self.loader.registry()
    }

    /// The attached similarity store.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn SimilarityStore>> {
        self.store.as_ref()
    }

    /// A session in the configured default mode.
    #[must_use]
    pub fn new_session(&self) -> Session {
        Session::new(self.config.default_mode, self.config.max_history)
    }

    /// Handle one user turn.
    ///
    /// A bare directive switches the session mode. A directive followed by
    /// text answers that text in the named mode without switching. Anything
    /// else is answered in the session mode.
    ///
    /// # Errors
    ///
    /// See [`answer`](Self::answer). The session's last trace is updated
    /// even when the query fails.
    pub async fn handle(
        &self,
        session: &mut Session,
        input: &str,
        cancel: &CancellationToken,
    ) -> RuntimeResult<TurnOutcome> {
        let directive = parse_directive(input);
        if directive.is_bare_switch()
            && let Some(mode) = directive.mode
        {
            info!(session = %session.id, %mode, "Session mode changed");
            session.set_mode(mode);
            return Ok(TurnOutcome::ModeChanged(mode));
        }

        let mode = directive.mode.unwrap_or(session.mode);
        let ctx = RequestContext::new("orchestrator")
            .with_session_id(session.id)
            .with_mode(mode.as_str())
            .with_operation("turn");

        match self
            .answer_in(ctx, directive.text, mode, session.history(), cancel)
            .await
        {
            Ok(answer) => {
                session.record_exchange(directive.text.trim(), &answer.text);
                session.set_last_trace(Some(answer.trace.clone()));
                Ok(TurnOutcome::Answered(Box::new(answer)))
            },
            Err(e) => {
                session.set_last_trace(e.trace().cloned());
                Err(e)
            },
        }
    }

    /// Answer one query in `mode` with prior `history`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::EmptyInput`] for a blank query,
    /// [`RuntimeError::Timeout`] when the configured deadline passes,
    /// [`RuntimeError::Cancelled`] when `cancel` fires, and
    /// [`RuntimeError::Llm`] when the model call fails. Store failures and
    /// tool failures are not errors.
    pub async fn answer(
        &self,
        query: &str,
        mode: OperatingMode,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> RuntimeResult<Answer> {
        let ctx = RequestContext::new("orchestrator")
            .with_mode(mode.as_str())
            .with_operation("answer");
        self.answer_in(ctx, query, mode, history, cancel).await
    }

    async fn answer_in(
        &self,
        ctx: RequestContext,
        query: &str,
        mode: OperatingMode,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> RuntimeResult<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RuntimeError::EmptyInput);
        }

        let span = ctx.span();
        let budget = RequestBudget::new(self.config.request_timeout, cancel.clone());
        let result = self
            .dispatch(query, mode, history, &budget)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(answer) => info!(
                status = %answer.status,
                rounds = answer.rounds,
                grounded = answer.grounding.is_grounded(),
                elapsed_ms = ctx.elapsed_ms(),
                "Query answered"
            ),
            Err(e) => warn!(
                status = e.status(),
                error = %e,
                elapsed_ms = ctx.elapsed_ms(),
                "Query failed"
            ),
        });
        result
    }

    async fn dispatch(
        &self,
        query: &str,
        mode: OperatingMode,
        history: &[Message],
        budget: &RequestBudget,
    ) -> RuntimeResult<Answer> {
        let mut trace = ExecutionTrace::new();
        trace.push_user(query);

        match mode {
            OperatingMode::Chat => {
                let retrieved = Retrieved::ungrounded(Grounding::NotAttempted);
                self.single_shot(query, mode, history, retrieved, budget, trace)
                    .await
            },
            OperatingMode::Rag | OperatingMode::Auto => {
                let retrieved = self.consult_gate(query, mode, budget, &mut trace).await?;
                self.single_shot(query, mode, history, retrieved, budget, trace)
                    .await
            },
            OperatingMode::Agent => self.run_agent(query, history, budget, trace).await,
        }
    }

    async fn consult_gate(
        &self,
        query: &str,
        mode: OperatingMode,
        budget: &RequestBudget,
        trace: &mut ExecutionTrace,
    ) -> RuntimeResult<Retrieved> {
        let Some(store) = &self.store else {
            debug!(%mode, "No similarity store attached, answering ungrounded");
            return Ok(Retrieved::ungrounded(Grounding::NoUsableContext {
                best_score: None,
            }));
        };

        let outcome = budget
            .run(self.gate.evaluate(query, mode, store.as_ref()))
            .await
            .map_err(|interrupt| RuntimeError::interrupted(interrupt, budget.timeout(), trace))?;

        Ok(match outcome {
            GateOutcome::Skipped => Retrieved::ungrounded(Grounding::NotAttempted),
            GateOutcome::Grounded(passages) => Retrieved {
                grounding: Grounding::Grounded {
                    sources: distinct_sources(&passages)
                        .into_iter()
                        .map(ToString::to_string)
                        .collect(),
                    best_score: passages.first().map_or(0.0, |p| p.score),
                },
                passages,
            },
            GateOutcome::NoUsableContext { best_score } => {
                Retrieved::ungrounded(Grounding::NoUsableContext { best_score })
            },
            GateOutcome::StoreUnavailable(e) => {
                Retrieved::ungrounded(Grounding::StoreUnavailable {
                    reason: e.to_string(),
                })
            },
        })
    }

    async fn single_shot(
        &self,
        query: &str,
        mode: OperatingMode,
        history: &[Message],
        retrieved: Retrieved,
        budget: &RequestBudget,
        mut trace: ExecutionTrace,
    ) -> RuntimeResult<Answer> {
        let user_turn = if retrieved.passages.is_empty() {
            query.to_string()
        } else {
            build_grounded_prompt(query, &format_context(&retrieved.passages))
        };
        let mut messages = history.to_vec();
        messages.push(Message::user(user_turn));
        let system = prompt::base_prompt(&self.config.system_prompt);

        let response = match budget.run(self.llm.complete(&messages, &[], system)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(RuntimeError::llm(e, &mut trace)),
            Err(interrupt) => {
                return Err(RuntimeError::interrupted(
                    interrupt,
                    budget.timeout(),
                    &mut trace,
                ));
            },
        };

        let text = response.message.text().unwrap_or_default().to_string();
        trace.push_model_text(1, text.as_str());

        let (text, status) = if text.trim().is_empty() {
            (EMPTY_RESPONSE_NOTICE.to_string(), AnswerStatus::EmptyResponse)
        } else if self.config.include_sources
            && let Some(footer) = format_sources(&retrieved.passages)
        {
            (format!("{text}\n\n{footer}"), AnswerStatus::Completed)
        } else {
            (text, AnswerStatus::Completed)
        };

        Ok(Answer {
            text,
            status,
            mode,
            grounding: retrieved.grounding,
            trace,
            rounds: 1,
            activated: Vec::new(),
        })
    }

    async fn run_agent(
        &self,
        query: &str,
        history: &[Message],
        budget: &RequestBudget,
        mut trace: ExecutionTrace,
    ) -> RuntimeResult<Answer> {
        let index = self.loader.registry().snapshot();
        let catalog = prompt::skill_catalog(&index, query);
        debug!(skills = index.len(), "Starting agent loop");

        let mut messages = history.to_vec();
        messages.push(Message::user(query));

        let limits = LoopLimits {
            max_rounds: self.config.max_rounds,
            max_binding_failures: self.config.max_binding_failures,
            retrieval_k: self.config.retrieval_k,
            search_tool: self.config.agent_search_tool,
            web_results: self.config.web_search_results,
            web_tool: self.config.agent_web_search,
        };
        let mut tool_loop = ToolLoop::new(self.llm.as_ref(), &self.loader, budget, limits);
        if let Some(store) = &self.store {
            tool_loop = tool_loop.with_store(store.as_ref());
        }
        if let Some(web) = &self.web {
            tool_loop = tool_loop.with_web_search(web.as_ref());
        }

        let base = prompt::base_prompt(&self.config.system_prompt);
        let outcome = tool_loop.run(messages, base, &catalog, &mut trace).await?;

        Ok(Answer {
            text: outcome.text,
            status: outcome.status,
            mode: OperatingMode::Agent,
            grounding: Grounding::NotAttempted,
            trace,
            rounds: outcome.rounds,
            activated: outcome.activated,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use conduit_test::{
        FailingStore, MockLlmProvider, MockLlmTurn, SkillBundleFixture, SlowStore, StaticStore,
        StaticWebSearch,
    };
    use serde_json::json;

    use super::*;

    fn orchestrator(turns: Vec<MockLlmTurn>) -> Orchestrator<MockLlmProvider> {
        let registry = SkillRegistry::empty();
        let loader = Arc::new(SkillLoader::new(Arc::new(registry)));
        Orchestrator::new(MockLlmProvider::new(turns), loader, RuntimeConfig::default())
    }

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_chat_skips_retrieval_and_tools() {
        let store = Arc::new(StaticStore::single("secret", 0.1, "a.md"));
        let orch = orchestrator(vec![MockLlmTurn::text("Hello!")]).with_store(store.clone());

        let answer = orch
            .answer("hi", OperatingMode::Chat, &[], &cancel())
            .await
            .unwrap();

        assert_eq!(answer.text, "Hello!");
        assert_eq!(answer.grounding, Grounding::NotAttempted);
        assert_eq!(store.query_count(), 0);
        assert!(orch.llm().recorded_tools()[0].is_empty());
    }

    #[tokio::test]
    async fn test_rag_injects_poor_match() {
        let store = Arc::new(StaticStore::single("Refunds take 30 days.", 9.9, "policy.md"));
        let orch = orchestrator(vec![MockLlmTurn::text("30 days.")]).with_store(store);

        let answer = orch
            .answer("refund time?", OperatingMode::Rag, &[], &cancel())
            .await
            .unwrap();

        assert!(answer.grounding.is_grounded());
        let sent = orch.llm().recorded_messages();
        let last = sent[0].last().and_then(Message::text).unwrap();
        assert!(last.contains("Refunds take 30 days."));
        assert!(last.ends_with("Question: refund time?"));
        assert!(answer.text.ends_with("Sources:\n- policy.md"));
    }

    #[tokio::test]
    async fn test_auto_rejects_poor_match() {
        let store = Arc::new(StaticStore::single("Refunds take 30 days.", 9.9, "policy.md"));
        let orch = orchestrator(vec![MockLlmTurn::text("Not sure.")]).with_store(store);

        let answer = orch
            .answer("refund time?", OperatingMode::Auto, &[], &cancel())
            .await
            .unwrap();

        assert_eq!(
            answer.grounding,
            Grounding::NoUsableContext {
                best_score: Some(9.9)
            }
        );
        let sent = orch.llm().recorded_messages();
        assert_eq!(sent[0].last().and_then(Message::text), Some("refund time?"));
        assert_eq!(answer.text, "Not sure.");
        assert!(answer.notice().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_falls_back() {
        let orch = orchestrator(vec![MockLlmTurn::text("General answer.")])
            .with_store(Arc::new(FailingStore::new("index offline")));

        let answer = orch
            .answer("q", OperatingMode::Rag, &[], &cancel())
            .await
            .unwrap();
        assert!(matches!(answer.grounding, Grounding::StoreUnavailable { .. }));
        assert!(answer.notice().is_some());
        assert_eq!(answer.status, AnswerStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_sources_footer_when_disabled() {
        let registry = SkillRegistry::empty();
        let loader = Arc::new(SkillLoader::new(Arc::new(registry)));
        let config = RuntimeConfig {
            include_sources: false,
            ..RuntimeConfig::default()
        };
        let orch = Orchestrator::new(
            MockLlmProvider::new(vec![MockLlmTurn::text("answer")]),
            loader,
            config,
        )
        .with_store(Arc::new(StaticStore::single("ctx", 0.1, "a.md")));

        let answer = orch
            .answer("q", OperatingMode::Auto, &[], &cancel())
            .await
            .unwrap();
        assert_eq!(answer.text, "answer");
    }

    #[tokio::test]
    async fn test_agent_exposes_catalog_only() {
        let fixture = SkillBundleFixture::new();
        fixture.google_sheets();
        fixture.bundle_with_long_instructions("big-skill", "A large skill", 50_000);
        let (registry, _) = SkillRegistry::discover(fixture.root()).unwrap();
        let loader = Arc::new(SkillLoader::new(Arc::new(registry)).with_natives(fixture.natives()));
        let orch = Orchestrator::new(
            MockLlmProvider::new(vec![MockLlmTurn::text("No skill needed.")]),
            loader,
            RuntimeConfig::default(),
        );

        let answer = orch
            .answer("hello", OperatingMode::Agent, &[], &cancel())
            .await
            .unwrap();

        assert_eq!(answer.status, AnswerStatus::Completed);
        let system = &orch.llm().recorded_systems()[0];
        assert!(system.contains("- **big-skill**: A large skill"));
        assert!(system.len() < 5_000);
        assert!(!orch.loader().is_loaded("big-skill"));
    }

    #[tokio::test]
    async fn test_handle_bare_directive_switches_mode() {
        let orch = orchestrator(vec![MockLlmTurn::text("a")]);
        let mut session = orch.new_session();
        assert_eq!(session.mode, OperatingMode::Auto);

        let outcome = orch.handle(&mut session, "/chat", &cancel()).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::ModeChanged(OperatingMode::Chat)));
        assert_eq!(session.mode, OperatingMode::Chat);
        assert_eq!(orch.llm().call_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_inline_directive_is_one_shot() {
        let store = Arc::new(StaticStore::single("ctx", 5.0, "a.md"));
        let orch = orchestrator(vec![MockLlmTurn::text("a"), MockLlmTurn::text("b")])
            .with_store(store.clone());
        let mut session = orch.new_session();
        session.set_mode(OperatingMode::Chat);

        let outcome = orch
            .handle(&mut session, "/rag what is ctx?", &cancel())
            .await
            .unwrap();
        let TurnOutcome::Answered(answer) = outcome else {
            panic!("expected an answer");
        };
        assert_eq!(answer.mode, OperatingMode::Rag);
        assert_eq!(session.mode, OperatingMode::Chat);
        assert_eq!(session.history()[0].text(), Some("what is ctx?"));

        orch.handle(&mut session, "and now?", &cancel()).await.unwrap();
        assert_eq!(store.query_count(), 1);
        // Second request carried the first exchange as history.
        assert_eq!(orch.llm().recorded_messages()[1].len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_slash_token_is_query_text() {
        let orch = orchestrator(vec![MockLlmTurn::text("a")]);
        let mut session = orch.new_session();
        orch.handle(&mut session, "/help me", &cancel()).await.unwrap();
        assert_eq!(session.mode, OperatingMode::Auto);
        assert_eq!(
            orch.llm().recorded_messages()[0][0].text(),
            Some("/help me")
        );
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let orch = orchestrator(vec![]);
        let err = orch
            .answer("   ", OperatingMode::Chat, &[], &cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::EmptyInput));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let registry = SkillRegistry::empty();
        let loader = Arc::new(SkillLoader::new(Arc::new(registry)));
        let config =
            RuntimeConfig::default().with_request_timeout(Some(Duration::from_millis(100)));
        let orch = Orchestrator::new(
            MockLlmProvider::new(vec![MockLlmTurn::text("never")]),
            loader,
            config,
        )
        .with_store(Arc::new(SlowStore::new(Duration::from_secs(30))));
        let mut session = orch.new_session();

        let err = orch
            .handle(&mut session, "/rag q", &cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { .. }));
        assert_eq!(orch.llm().call_count(), 0);
        assert_eq!(session.last_trace().map(ExecutionTrace::len), Some(1));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_model_call() {
        let orch = orchestrator(vec![MockLlmTurn::text("never")]);
        let token = CancellationToken::new();
        token.cancel();
        let err = orch
            .answer("q", OperatingMode::Chat, &[], &token)
            .await
            .unwrap_err();
        assert_eq!(err.status(), "cancelled");
    }

    #[tokio::test]
    async fn test_llm_failure_surfaces() {
        let orch = orchestrator(vec![MockLlmTurn::error("503")]);
        let err = orch
            .answer("q", OperatingMode::Chat, &[], &cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Llm { .. }));
        assert_eq!(err.trace().map(ExecutionTrace::len), Some(1));
    }

    #[tokio::test]
    async fn test_agent_search_tool_uses_store() {
        let store = Arc::new(StaticStore::single("Refunds take 30 days.", 0.2, "policy.md"));
        let orch = orchestrator(vec![
            MockLlmTurn::call("c1", "search_documents", json!({"query": "refund"})),
            MockLlmTurn::text("30 days."),
        ])
        .with_store(store.clone());

        let answer = orch
            .answer("refund time?", OperatingMode::Agent, &[], &cancel())
            .await
            .unwrap();
        assert_eq!(answer.text, "30 days.");
        assert_eq!(answer.grounding, Grounding::NotAttempted);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_agent_web_search_gated_by_config() {
        let turns = || {
            vec![
                MockLlmTurn::call("c1", "web_search", json!({"query": "weather"})),
                MockLlmTurn::text("Sunny."),
            ]
        };
        let web = Arc::new(StaticWebSearch::single(
            "Forecast",
            "https://example.com/forecast",
            "Forecast - sunny all week",
        ));

        let orch = orchestrator(turns()).with_web_search(web.clone());
        let answer = orch
            .answer("weather?", OperatingMode::Agent, &[], &cancel())
            .await
            .unwrap();
        assert_eq!(answer.text, "Sunny.");
        assert_eq!(web.queries(), vec!["weather"]);

        let config = RuntimeConfig {
            agent_web_search: false,
            ..RuntimeConfig::default()
        };
        let loader = Arc::new(SkillLoader::new(Arc::new(SkillRegistry::empty())));
        let orch = Orchestrator::new(MockLlmProvider::new(turns()), loader, config)
            .with_web_search(web.clone());
        orch.answer("weather?", OperatingMode::Agent, &[], &cancel())
            .await
            .unwrap();
        assert_eq!(orch.llm().recorded_tools()[0], vec!["activate_skill"]);
        assert_eq!(web.queries().len(), 1);
    }
}
