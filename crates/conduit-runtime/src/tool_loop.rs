//! Bounded tool-invocation loop.
//!
//! ```text
//!  AwaitingModel --text--> Done
//!       |    ^
//!     calls  |
//!       v    |
//!  ExecutingTools --too many failed activations--> BindingFailuresExhausted
//!
//!  AwaitingModel after `max_rounds` model calls --> Exhausted
//! ```
//!
//! Every model call and every tool await runs under the request budget.
//! Calls are checked against the set exposed at the start of the round;
//! activations made during a round take effect from the next one.

use std::sync::Arc;

use conduit_core::truncate_to_boundary;
use conduit_llm::{LlmProvider, Message, MessageContent, ToolCall, ToolCallResult};
use conduit_retrieval::context::format_context;
use conduit_retrieval::{RetrievalGate, SimilarityStore, WebSearch, format_web_results};
use conduit_skills::{CallError, LoadError, LoadedCapability, SkillLoader, render_output};
use tracing::{debug, info, warn};

use crate::answer::AnswerStatus;
use crate::budget::{Interrupt, RequestBudget};
use crate::error::{RuntimeError, RuntimeResult};
use crate::prompt;
use crate::tools::{ExposedTools, ToolKind};
use crate::trace::ExecutionTrace;

/// Answer used when the model's final text is blank.
pub const EMPTY_RESPONSE_NOTICE: &str =
    "The model returned an empty answer. Try rephrasing the request.";

/// Longest tool output quoted in a synthesized answer.
const MAX_EXCERPT_BYTES: usize = 1_500;

/// Caps for one agent query.
#[derive(Debug, Clone, Copy)]
pub struct LoopLimits {
    /// Model calls per query.
    pub max_rounds: usize,
    /// Consecutive failed activations tolerated.
    pub max_binding_failures: usize,
    /// Passages returned by `search_documents`.
    pub retrieval_k: usize,
    /// Expose `search_documents` when a store is attached.
    pub search_tool: bool,
    /// Hits returned by `web_search`.
    pub web_results: usize,
    /// Expose `web_search` when a backend is attached.
    pub web_tool: bool,
}

/// How the loop ended.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Model answer or synthesized fallback. Never blank.
    pub text: String,
    /// Terminal status.
    pub status: AnswerStatus,
    /// Model calls made.
    pub rounds: usize,
    /// Skills activated, in order.
    pub activated: Vec<String>,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
    Exhausted,
    BindingFailuresExhausted,
}

enum Activation {
    NotRequested,
    Loaded(Arc<LoadedCapability>),
    Failed,
}

struct Executed {
    result: ToolCallResult,
    error_kind: Option<&'static str>,
    activation: Activation,
}

impl Executed {
    fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            result: ToolCallResult::success(&call.id, content),
            error_kind: None,
            activation: Activation::NotRequested,
        }
    }

    fn failure(call: &ToolCall, message: impl Into<String>, kind: &'static str) -> Self {
        Self {
            result: ToolCallResult::error(&call.id, message),
            error_kind: Some(kind),
            activation: Activation::NotRequested,
        }
    }

    fn call_error(call: &ToolCall, error: &CallError) -> Self {
        Self::failure(call, error.to_string(), error.kind())
    }
}

/// Drives model rounds until a text answer or a cap.
pub struct ToolLoop<'a> {
    llm: &'a dyn LlmProvider,
    loader: &'a SkillLoader,
    store: Option<&'a dyn SimilarityStore>,
    web: Option<&'a dyn WebSearch>,
    budget: &'a RequestBudget,
    limits: LoopLimits,
}

impl<'a> ToolLoop<'a> {
    /// Create a loop without a document store.
    #[must_use]
    pub fn new(
        llm: &'a dyn LlmProvider,
        loader: &'a SkillLoader,
        budget: &'a RequestBudget,
        limits: LoopLimits,
    ) -> Self {
        Self {
            llm,
            loader,
            store: None,
            web: None,
            budget,
            limits,
        }
    }

    /// Attach a store for `search_documents`.
    #[must_use]
    pub fn with_store(mut self, store: &'a dyn SimilarityStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach a backend for `web_search`.
    #[must_use]
    pub fn with_web_search(mut self, web: &'a dyn WebSearch) -> Self {
        self.web = Some(web);
        self
    }

    /// Run the loop.
    ///
    /// `messages` must end with the user turn. `catalog` is the skill
    /// metadata listing; it is the only skill information the model sees
    /// before an activation.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Timeout`] or [`RuntimeError::Cancelled`] when the
    /// budget interrupts an await, [`RuntimeError::Llm`] when the model call
    /// fails. Failed tool calls are not errors.
    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        base_system: &str,
        catalog: &str,
        trace: &mut ExecutionTrace,
    ) -> RuntimeResult<LoopOutcome> {
        let with_search = self.limits.search_tool && self.store.is_some();
        let with_web = self.limits.web_tool && self.web.is_some();
        let mut exposed = ExposedTools::for_agent(with_search, with_web);
        let mut round: usize = 0;
        let mut binding_failures: usize = 0;
        let mut last_output: Option<String> = None;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel if round >= self.limits.max_rounds => LoopState::Exhausted,

                LoopState::AwaitingModel => {
                    round = round.saturating_add(1);
                    let system = prompt::agent_system_prompt(
                        base_system,
                        catalog,
                        exposed.instruction_segments(),
                    );
                    let tools = exposed.definitions();
                    debug!(round, tools = tools.len(), "Requesting model round");

                    let response = match self
                        .budget
                        .run(self.llm.complete(&messages, &tools, &system))
                        .await
                    {
                        Ok(Ok(response)) => response,
                        Ok(Err(e)) => return Err(RuntimeError::llm(e, trace)),
                        Err(interrupt) => return Err(self.interrupted(interrupt, trace)),
                    };

                    match response.message.content {
                        MessageContent::ToolCalls(calls) if !calls.is_empty() => {
                            trace.push_model_calls(round, &calls);
                            messages.push(Message::assistant_with_tools(calls.clone()));
                            if round >= self.limits.max_rounds {
                                // No round left to show the results to the model.
                                LoopState::Exhausted
                            } else {
                                LoopState::ExecutingTools(calls)
                            }
                        },
                        MessageContent::Text(text) => {
                            trace.push_model_text(round, text.as_str());
                            LoopState::Done(text)
                        },
                        MessageContent::ToolCalls(_) | MessageContent::ToolResult(_) => {
                            trace.push_model_text(round, "");
                            LoopState::Done(String::new())
                        },
                    }
                },

                LoopState::ExecutingTools(calls) => {
                    let mut loaded = Vec::new();
                    let mut activation_failed = false;
                    for call in &calls {
                        let executed = match self.execute(call, &exposed).await {
                            Ok(executed) => executed,
                            Err(interrupt) => return Err(self.interrupted(interrupt, trace)),
                        };
                        match executed.activation {
                            Activation::Loaded(capability) => loaded.push(capability),
                            Activation::Failed => activation_failed = true,
                            Activation::NotRequested => {},
                        }
                        if !executed.result.is_error {
                            last_output = Some(executed.result.content.clone());
                        }
                        trace.push_tool_result(round, call, &executed.result, executed.error_kind);
                        messages.push(Message::tool_result(executed.result));
                    }

                    for capability in &loaded {
                        let added = exposed.add_capability(capability);
                        info!(skill = %capability.name(), tools = ?added, "Skill activated");
                    }

                    // At most one failure per round; any load in the round resets.
                    if !loaded.is_empty() {
                        binding_failures = 0;
                    } else if activation_failed {
                        binding_failures = binding_failures.saturating_add(1);
                    }

                    if binding_failures >= self.limits.max_binding_failures {
                        warn!(failures = binding_failures, "Giving up after repeated activation failures");
                        LoopState::BindingFailuresExhausted
                    } else {
                        LoopState::AwaitingModel
                    }
                },

                LoopState::Done(text) => {
                    let (text, status) = if text.trim().is_empty() {
                        warn!(round, "Model returned a blank answer");
                        (EMPTY_RESPONSE_NOTICE.to_string(), AnswerStatus::EmptyResponse)
                    } else {
                        (text, AnswerStatus::Completed)
                    };
                    return Ok(outcome(text, status, round, &exposed));
                },

                LoopState::Exhausted => {
                    warn!(rounds = round, "Tool loop hit its round cap");
                    let text = exhausted_answer(self.limits.max_rounds, last_output.as_deref());
                    return Ok(outcome(
                        text,
                        AnswerStatus::IterationBudgetExhausted,
                        round,
                        &exposed,
                    ));
                },

                LoopState::BindingFailuresExhausted => {
                    let text = format!(
                        "I couldn't load the skills this request needs after {binding_failures} \
                         failed attempts, so I can't complete it."
                    );
                    return Ok(outcome(
                        text,
                        AnswerStatus::BindingFailuresExhausted,
                        round,
                        &exposed,
                    ));
                },
            };
        }
    }

    fn interrupted(&self, interrupt: Interrupt, trace: &mut ExecutionTrace) -> RuntimeError {
        RuntimeError::interrupted(interrupt, self.budget.timeout(), trace)
    }

    async fn execute(&self, call: &ToolCall, exposed: &ExposedTools) -> Result<Executed, Interrupt> {
        let Some(tool) = exposed.get(&call.name) else {
            debug!(tool = %call.name, "Model called a tool that is not exposed");
            let error = CallError::UnknownCallable {
                name: call.name.clone(),
            };
            let available = exposed.names().collect::<Vec<_>>().join(", ");
            return Ok(Executed::failure(
                call,
                format!("{error}. Available tools: {available}."),
                error.kind(),
            ));
        };

        if let Err(e) = tool.signature.validate(&call.arguments) {
            debug!(tool = %call.name, error = %e, "Rejected tool arguments");
            return Ok(Executed::call_error(call, &e));
        }

        match &tool.kind {
            ToolKind::ActivateSkill => self.activate(call, exposed).await,
            ToolKind::SearchDocuments => self.search(call).await,
            ToolKind::WebSearch => self.search_web(call).await,
            ToolKind::Skill { skill, callable } => {
                debug!(skill = %skill, tool = %call.name, "Invoking skill tool");
                match self.budget.run(callable.call(call.arguments.clone())).await? {
                    Ok(value) => Ok(Executed::success(call, render_output(&value))),
                    Err(e) => {
                        warn!(skill = %skill, tool = %call.name, error = %e, "Skill tool failed");
                        Ok(Executed::call_error(call, &e))
                    },
                }
            },
        }
    }

    async fn activate(&self, call: &ToolCall, exposed: &ExposedTools) -> Result<Executed, Interrupt> {
        let name = call.str_arg("skill_name").unwrap_or_default().trim();

        if exposed.is_activated(name) {
            return Ok(Executed::success(
                call,
                format!("Skill '{name}' is already active."),
            ));
        }

        match self.budget.run(self.loader.load(name)).await? {
            Ok(capability) => {
                let new_tools: Vec<String> = capability
                    .callable_names()
                    .filter(|n| exposed.get(n).is_none())
                    .map(ToString::to_string)
                    .collect();
                let message = if new_tools.is_empty() {
                    format!("Skill '{name}' activated. It adds no tools; follow its instructions.")
                } else {
                    format!(
                        "Skill '{name}' activated. Tools available from your next step: {}.",
                        new_tools.join(", ")
                    )
                };
                Ok(Executed {
                    result: ToolCallResult::success(&call.id, message),
                    error_kind: None,
                    activation: Activation::Loaded(capability),
                })
            },
            Err(e) => {
                warn!(skill = %name, error = %e, "Skill activation failed");
                let message = match &e {
                    LoadError::CapabilityNotFound { .. } => {
                        let index = self.loader.registry().snapshot();
                        let available = index.names().collect::<Vec<_>>().join(", ");
                        format!("{e}. Available skills: {available}.")
                    },
                    _ => e.to_string(),
                };
                Ok(Executed {
                    result: ToolCallResult::error(&call.id, message),
                    error_kind: Some(e.kind()),
                    activation: Activation::Failed,
                })
            },
        }
    }

    async fn search(&self, call: &ToolCall) -> Result<Executed, Interrupt> {
        let Some(store) = self.store else {
            return Ok(Executed::failure(
                call,
                "No document store is attached.",
                "store_unavailable",
            ));
        };
        let query = call.str_arg("query").unwrap_or_default();

        let retrieved = self
            .budget
            .run(RetrievalGate::retrieve(query, self.limits.retrieval_k, store))
            .await?;
        Ok(match retrieved {
            Ok(passages) if passages.is_empty() => {
                Executed::success(call, "No matching documents found.")
            },
            Ok(passages) => {
                debug!(count = passages.len(), "Document search returned passages");
                Executed::success(call, format_context(&passages))
            },
            Err(e) => {
                warn!(store = store.name(), error = %e, "Document search failed");
                Executed::failure(call, e.to_string(), "store_unavailable")
            },
        })
    }

    async fn search_web(&self, call: &ToolCall) -> Result<Executed, Interrupt> {
        let Some(web) = self.web else {
            return Ok(Executed::failure(
                call,
                "Web search is not available.",
                "web_search_unavailable",
            ));
        };
        let query = call.str_arg("query").unwrap_or_default();

        let found = self
            .budget
            .run(web.search(query, self.limits.web_results))
            .await?;
        Ok(match found {
            Ok(results) if results.is_empty() => Executed::success(call, "No web results found."),
            Ok(results) => {
                debug!(backend = web.name(), count = results.len(), "Web search returned results");
                Executed::success(call, format_web_results(&results))
            },
            Err(e) => {
                warn!(backend = web.name(), error = %e, "Web search failed");
                Executed::failure(call, e.to_string(), "web_search_unavailable")
            },
        })
    }
}

fn outcome(text: String, status: AnswerStatus, rounds: usize, exposed: &ExposedTools) -> LoopOutcome {
    LoopOutcome {
        text,
        status,
        rounds,
        activated: exposed.activated().to_vec(),
    }
}

fn exhausted_answer(max_rounds: usize, last_output: Option<&str>) -> String {
    let mut text = format!(
        "I couldn't complete this request within {max_rounds} steps. \
         Try narrowing the request or breaking it into smaller parts."
    );
    if let Some(output) = last_output.map(str::trim).filter(|o| !o.is_empty()) {
        text.push_str("\n\nThe last tool result was:\n");
        text.push_str(truncate_to_boundary(output, MAX_EXCERPT_BYTES));
    }
    text
}
