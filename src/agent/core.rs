//! The ReAct agent loop: the bounded state machine that alternates model
//! calls, response parsing, tool execution, and termination checks.
//!
//! Grounded on `crewai`'s `CrewAgentExecutor` (`invoke_loop_react`: build
//! prompt, call model, parse, execute, append to scratchpad, check
//! termination, repeat) generalized per spec.md sections 4 and 7 to run
//! against role-addressed tools and pluggable termination conditions instead
//! of a fixed crew/task pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;
use uuid::Uuid;

use crate::agent::conversation::{ConversationStore, ConversationTurn};
use crate::agent::scratchpad::{ScratchpadStep, ScratchpadStore};
use crate::agent::AgentCard;
use crate::error::AgentMeshError;
use crate::kvs::Kvs;
use crate::model::{Message, ModelClient};
use crate::parser::{self, ParsedOutput};
use crate::playbook::PlaybookGenerator;
use crate::stream::{StreamBus, StreamEvent};
use crate::termination::{ErrorCounter, TerminationCondition, TerminationContext};
use crate::tools::memory::ToolMemoryManager;
use crate::tools::{execution, ToolRegistry};

/// How long a failed iteration (model timeout, errored tool call) waits
/// before the next attempt.
const ITERATION_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Static per-role configuration an [`AgentCore`] runs under.
pub struct AgentConfig {
    pub max_iterations: u32,
    pub llm_timeout_secs: u64,
    pub termination_conditions: Vec<TerminationCondition>,
    pub prompt_template: String,
    pub model_name: Option<String>,
    /// Maximum number of most-recent scratchpad steps replayed into the
    /// prompt (spec.md section 3's "memory size" / section 4.3's "memory
    /// window"). Older steps stay in the persisted history but drop out of
    /// `agent_scratchpad`.
    pub scratchpad_memory_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            max_iterations: 15,
            llm_timeout_secs: 60,
            termination_conditions: Vec::new(),
            prompt_template: AgentConfig::DEFAULT_PROMPT_TEMPLATE.to_string(),
            model_name: None,
            scratchpad_memory_size: AgentConfig::DEFAULT_SCRATCHPAD_MEMORY_SIZE,
        }
    }
}

impl AgentConfig {
    /// Default memory window when a role doesn't configure one.
    pub const DEFAULT_SCRATCHPAD_MEMORY_SIZE: usize = 20;

    /// A generic ReAct system prompt used when a role doesn't override one.
    pub const DEFAULT_PROMPT_TEMPLATE: &'static str = "You are {role}. {description}\n\n\
You have access to the following tools:\n{tool_descriptions}\n\n\
Respond using this format:\n\
Thought: your reasoning\n\
Action: the tool to call\n\
Action Input: a JSON object of arguments\n\
... (repeat Thought/Action/Action Input as needed)\n\
Thought: I now know the final answer\n\
Answer: the final answer to the original question\n\n\
Call the `final_answer` tool once you have the answer.";
}

/// What an agent loop produced once it stopped with a final answer.
#[derive(Debug, Clone)]
pub struct AgentFinish {
    pub answer: String,
    /// True when the answer came from the regex/LLM-repair/give-up stages of
    /// the parser (or from a non-`ToolName` termination condition firing)
    /// rather than a clean structured `final_answer` call — see
    /// SPEC_FULL.md's Open Question 1.
    pub synthetic: bool,
    pub iterations: u32,
}

/// One running agent's loop state: identity, collaborators, and the
/// mutable bits (error tally, stop flag) that persist across iterations.
/// The scratchpad itself lives in the KVS, not here — `run` reloads it at
/// the start of every invocation, which is what [`AgentCore::clear_context`]
/// resets.
pub struct AgentCore {
    pub card: AgentCard,
    config: AgentConfig,
    kvs: Arc<dyn Kvs>,
    model: Arc<dyn ModelClient>,
    stream: Arc<dyn StreamBus>,
    tools: ToolRegistry,
    tool_memory: Option<Arc<ToolMemoryManager>>,
    playbook: Option<Arc<PlaybookGenerator>>,
    scratchpad_store: ScratchpadStore,
    conversation_store: ConversationStore,
    stop_flag: Arc<AtomicBool>,
    error_counter: ErrorCounter,
    description: String,
    /// When this agent was constructed — spec.md section 5's `Timeout`
    /// termination condition is time-since-construction, not
    /// time-since-the-current-`run()`-call, since a handoff reply resumes
    /// the same agent instance rather than starting a fresh one.
    started_at: Instant,
}

impl AgentCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        card: AgentCard,
        config: AgentConfig,
        description: impl Into<String>,
        kvs: Arc<dyn Kvs>,
        model: Arc<dyn ModelClient>,
        stream: Arc<dyn StreamBus>,
        tools: ToolRegistry,
        tool_memory: Option<Arc<ToolMemoryManager>>,
        playbook: Option<Arc<PlaybookGenerator>>,
    ) -> Self {
        AgentCore {
            scratchpad_store: ScratchpadStore::new(kvs.clone()),
            conversation_store: ConversationStore::new(kvs.clone()),
            card,
            config,
            kvs,
            model,
            stream,
            tools,
            tool_memory,
            playbook,
            stop_flag: Arc::new(AtomicBool::new(false)),
            error_counter: ErrorCounter::new(),
            description: description.into(),
            started_at: Instant::now(),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Sets the stop flag observed at the next iteration boundary. Mirrors
    /// spec.md section 4.1's `stop()` operation; unregistering the agent
    /// from its role list is the caller's (listener/orchestrator)
    /// responsibility, since only it knows the role-registry key.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Empties this agent's persisted scratchpad for the current chat.
    /// Called by the listener before running a fresh task event so a new
    /// task doesn't see a previous, unrelated run's history.
    pub async fn clear_context(&self) -> Result<(), AgentMeshError> {
        self.scratchpad_store
            .clear(&self.card.chat_id, &self.card.id)
            .await
            .map_err(AgentMeshError::from)
    }

    /// Pauses for an interactive tool: emits `user_input_required` on the
    /// stream (carrying `prompt` and `input_type` for the UI to render) and
    /// then blocks, polling the single-slot mailbox `user_input:<node_id>`,
    /// until [`AgentCore::set_user_input`] fills it or the stop flag is set.
    /// Mirrors spec.md section 4.1's pause/resume pattern for tools that need
    /// a human in the loop (e.g. a confirmation dialog) mid-execution.
    pub async fn wait_for_user_input(
        &self,
        node_id: &str,
        prompt: &str,
        input_type: &str,
    ) -> Result<String, AgentMeshError> {
        self.stream.emit(
            &self.card.chat_id,
            StreamEvent::new(
                "user_input_required",
                serde_json::json!({
                    "agent_id": self.card.id,
                    "node_id": node_id,
                    "prompt": prompt,
                    "input_type": input_type,
                }),
            ),
        );

        let key = crate::kvs::user_input_key(node_id);
        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                return Err(AgentMeshError::ActionBad(
                    "agent stopped while waiting for user input".to_string(),
                ));
            }
            if let Some((_, value)) = self
                .kvs
                .blpop(&[key.clone()], 1.0)
                .await
                .map_err(AgentMeshError::from)?
            {
                return Ok(value);
            }
        }
    }

    /// Resumes a pending [`AgentCore::wait_for_user_input`] call for
    /// `node_id` by filling its mailbox with `value`.
    pub async fn set_user_input(kvs: &dyn Kvs, node_id: &str, value: &str) -> Result<(), AgentMeshError> {
        kvs.rpush(&crate::kvs::user_input_key(node_id), value.to_string())
            .await
            .map_err(AgentMeshError::from)
    }

    /// Appends a synthetic `receive_result` scratchpad step holding a
    /// handoff reply's payload, ahead of resuming `run` with
    /// `is_result=true`. Spec.md section 4.9/4.11: the agent's own loop
    /// observes this step as regular scratchpad history on its next
    /// iteration.
    pub async fn receive_result(&self, payload: &serde_json::Value) -> Result<(), AgentMeshError> {
        let step = ScratchpadStep::action(
            None,
            "receive_result".to_string(),
            &serde_json::Value::Null,
            Some(payload.to_string()),
            self.card.role.as_str(),
            Uuid::new_v4().to_string(),
        );
        self.scratchpad_store
            .append(&self.card.chat_id, &self.card.id, &step)
            .await
            .map_err(AgentMeshError::from)
    }

    /// Runs the ReAct loop for `query` against this agent's scratchpad
    /// history, until a final answer is produced, a termination condition
    /// fires, the loop exits on a `handoff` (returns `Ok(None)`), or
    /// `max_iterations` is exhausted.
    ///
    /// `is_result` mirrors spec.md section 4.1: `true` means the caller is
    /// resuming after a handoff reply, so no new origin scratchpad item (or
    /// user conversation turn) is created for this call.
    #[instrument(skip(self, query), fields(agent_id = %self.card.id, role = %self.card.role))]
    pub async fn run(
        &self,
        query: &str,
        is_result: bool,
    ) -> Result<Option<AgentFinish>, AgentMeshError> {
        let mut history = self
            .scratchpad_store
            .load(&self.card.chat_id, &self.card.id)
            .await?;

        if !is_result {
            let origin = ScratchpadStep::origin(query, self.card.role.as_str());
            self.scratchpad_store
                .append(&self.card.chat_id, &self.card.id, &origin)
                .await?;
            history.push(origin);

            self.conversation_store
                .append(
                    &self.card.chat_id,
                    &ConversationTurn {
                        role: "user".to_string(),
                        content: query.to_string(),
                        agent_id: Some(self.card.id.clone()),
                    },
                )
                .await?;
        }

        let mut playbook_text = match &self.playbook {
            Some(p) => p.load(&self.card.chat_id).await?,
            None => None,
        };

        for iteration in 1..=self.config.max_iterations {
            if self.stop_flag.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let prompt = self
                .build_prompt(query, &history, playbook_text.as_deref())
                .await;
            let completion = match self.call_model(&prompt).await {
                Ok(text) => text,
                Err(AgentMeshError::Model(crate::error::ModelError::Timeout(_))) => {
                    tracing::warn!(iteration, "model call timed out, retrying");
                    tokio::time::sleep(ITERATION_RETRY_DELAY).await;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let parsed = parser::parse(&completion, Some(self.model.as_ref()))
                .await
                .map_err(AgentMeshError::from)?;

            let thought = match &parsed {
                ParsedOutput::Action { thought, .. } => thought.clone(),
                ParsedOutput::Finish { thought, .. } => thought.clone(),
            };
            if let Some(thought) = &thought {
                self.stream.emit(
                    &self.card.chat_id,
                    StreamEvent::new(
                        "agent_thinking",
                        serde_json::json!({ "agent_id": self.card.id, "thought": thought }),
                    ),
                );
            }

            let outcome = self.handle_parsed(parsed, iteration).await?;

            match outcome {
                StepOutcome::Finish(finish) => {
                    return Ok(Some(self.finish(iteration, finish.0, finish.1).await?));
                }
                StepOutcome::HandedOff(step) => {
                    self.append_step(&mut history, step, &mut playbook_text)
                        .await?;
                    return Ok(None);
                }
                StepOutcome::Continue(step, errored) => {
                    self.append_step(&mut history, step, &mut playbook_text)
                        .await?;

                    let ctx = TerminationContext {
                        iteration,
                        tool_name: history.last().and_then(|s| s.tool.as_deref()),
                        final_answer: None,
                        thought: thought.as_deref(),
                        observation: history.last().and_then(|s| s.observation.as_deref()),
                        started_at: self.started_at,
                        tool_errored: errored,
                    };
                    if self.check_termination(&history, &ctx) {
                        let answer = history
                            .last()
                            .and_then(|s| s.observation.clone())
                            .unwrap_or_default();
                        return Ok(Some(self.finish(iteration, answer, true).await?));
                    }
                    if errored {
                        tokio::time::sleep(ITERATION_RETRY_DELAY).await;
                    }
                }
            }
        }

        let err = AgentMeshError::IterationBudgetExhausted {
            agent_id: self.card.id.clone(),
            iterations: self.config.max_iterations,
        };
        self.emit_error(&err);
        Err(err)
    }

    fn check_termination(&self, _history: &[ScratchpadStep], ctx: &TerminationContext) -> bool {
        self.config
            .termination_conditions
            .iter()
            .any(|cond| cond.should_terminate(ctx, &self.error_counter))
    }

    async fn append_step(
        &self,
        history: &mut Vec<ScratchpadStep>,
        step: ScratchpadStep,
        playbook_text: &mut Option<String>,
    ) -> Result<(), AgentMeshError> {
        self.scratchpad_store
            .append(&self.card.chat_id, &self.card.id, &step)
            .await?;
        let rendered = step.render();
        history.push(step);
        if let (Some(generator), Some(rendered)) = (&self.playbook, rendered) {
            let updated = generator
                .regenerate(&self.card.chat_id, playbook_text.as_deref(), &rendered)
                .await?;
            self.stream.emit(
                &self.card.chat_id,
                StreamEvent::new(
                    "playbook_update",
                    serde_json::json!({ "chat_id": self.card.chat_id, "playbook": updated }),
                ),
            );
            *playbook_text = Some(updated);
        }
        Ok(())
    }

    async fn finish(
        &self,
        iteration: u32,
        answer: String,
        synthetic: bool,
    ) -> Result<AgentFinish, AgentMeshError> {
        self.conversation_store
            .append(
                &self.card.chat_id,
                &ConversationTurn {
                    role: "assistant".to_string(),
                    content: answer.clone(),
                    agent_id: Some(self.card.id.clone()),
                },
            )
            .await?;
        self.emit_complete(&answer);
        Ok(AgentFinish {
            answer,
            synthetic,
            iterations: iteration,
        })
    }

    fn emit_complete(&self, answer: &str) {
        self.stream.emit(
            &self.card.chat_id,
            StreamEvent::new(
                "agent_complete",
                serde_json::json!({ "agent_id": self.card.id, "answer": answer }),
            ),
        );
    }

    fn emit_error(&self, err: &AgentMeshError) {
        self.stream.emit(
            &self.card.chat_id,
            StreamEvent::new(
                "agent_error",
                serde_json::json!({ "agent_id": self.card.id, "error": err.to_string() }),
            ),
        );
    }

    /// Interprets one parsed model turn into a [`StepOutcome`].
    async fn handle_parsed(
        &self,
        parsed: ParsedOutput,
        _iteration: u32,
    ) -> Result<StepOutcome, AgentMeshError> {
        match parsed {
            ParsedOutput::Finish {
                answer, synthetic, ..
            } => Ok(StepOutcome::Finish((answer, synthetic))),
            ParsedOutput::Action {
                thought,
                call,
                synthetic,
            } => {
                if call.tool == "final_answer" {
                    let answer = call
                        .tool_input
                        .get("answer")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| call.tool_input.to_string());
                    return Ok(StepOutcome::Finish((answer, synthetic)));
                }

                let tool_execution_id = Uuid::new_v4().to_string();
                let tool = match self.tools.get(&call.tool) {
                    Some(tool) => tool,
                    None => {
                        let observation = format!("tool '{}' is not available", call.tool);
                        return Ok(StepOutcome::Continue(
                            ScratchpadStep::action(
                                thought,
                                call.tool.clone(),
                                &call.tool_input,
                                Some(observation),
                                self.card.role.as_str(),
                                tool_execution_id,
                            ),
                            true,
                        ));
                    }
                };

                let result = execution::execute_tool(
                    tool.as_ref(),
                    call.tool_input.clone(),
                    &self.card.chat_id,
                    self.stream.as_ref(),
                    self.stop_flag.as_ref(),
                )
                .await;

                let (observation, errored, result_for_memory) = match &result {
                    Ok(value) => (value.to_string(), false, Ok(value.clone())),
                    Err(err) => (err.to_string(), true, Err(err.to_string())),
                };

                if let Some(memory) = &self.tool_memory {
                    memory
                        .record(&self.card.id, &call.tool, &call.tool_input, &result_for_memory)
                        .await;
                }

                let step = ScratchpadStep::action(
                    thought,
                    call.tool.clone(),
                    &call.tool_input,
                    Some(observation),
                    self.card.role.as_str(),
                    tool_execution_id,
                );

                if call.tool == "handoff" {
                    return Ok(StepOutcome::HandedOff(step));
                }
                Ok(StepOutcome::Continue(step, errored))
            }
        }
    }

    /// Builds the tools block of the system prompt: each tool's
    /// description, with its learned usage guidance appended when the tool
    /// memory manager has one on file (spec.md section 4.1 step 3 / 4.3 —
    /// the guidance learned in [`ToolMemoryManager::record`] is loaded back
    /// here, not just written).
    async fn describe_tools(&self) -> String {
        let mut lines = Vec::new();
        for descriptor in self.tools.descriptors() {
            let mut line = format!("- {}: {}", descriptor.name, descriptor.full_description);
            if let Some(memory) = &self.tool_memory {
                if let Ok(Some(guidance)) = memory.load(&self.card.id, &descriptor.name).await {
                    line.push_str(&format!(" Usage guidance: {guidance}"));
                }
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    async fn build_prompt(
        &self,
        query: &str,
        history: &[ScratchpadStep],
        playbook_text: Option<&str>,
    ) -> Vec<Message> {
        let tool_descriptions = self.describe_tools().await;

        let system = self
            .config
            .prompt_template
            .replace("{role}", self.card.role.as_str())
            .replace("{description}", &self.description)
            .replace("{tool_descriptions}", &tool_descriptions);

        let mut messages = vec![Message::system(system)];
        if let Some(playbook) = playbook_text {
            if !playbook.is_empty() {
                messages.push(Message::system(format!("Current plan:\n{playbook}")));
            }
        }

        // spec.md section 4.3's `planner` template variable: a scratchpad
        // step whose action is the `planner` tool is promoted out of the
        // regular scratchpad block into its own dedicated one, using its
        // most recent such observation.
        if let Some(observation) = history
            .iter()
            .rev()
            .find(|step| step.tool.as_deref() == Some("planner"))
            .and_then(|step| step.observation.as_deref())
        {
            messages.push(Message::system(format!("Planner:\n{observation}")));
        }

        // spec.md section 3/4.3's memory window: only the most recent
        // `scratchpad_memory_size` steps are replayed into the prompt, even
        // though the full history stays persisted in the KVS.
        let window_start = history
            .len()
            .saturating_sub(self.config.scratchpad_memory_size);
        for step in &history[window_start..] {
            if let Some(rendered) = step.render() {
                messages.push(Message::assistant(rendered));
            }
        }
        messages.push(Message::user(query.to_string()));
        messages
    }

    async fn call_model(&self, messages: &[Message]) -> Result<String, AgentMeshError> {
        let timeout = Duration::from_secs(self.config.llm_timeout_secs);
        let model_name = self.config.model_name.as_deref();
        match tokio::time::timeout(timeout, self.model.complete(messages, model_name)).await {
            Ok(Ok((text, _usage))) => Ok(text),
            Ok(Err(err)) => Err(AgentMeshError::Model(err)),
            Err(_) => Err(AgentMeshError::Model(crate::error::ModelError::Timeout(timeout))),
        }
    }
}

/// What one parsed model turn resolved to.
enum StepOutcome {
    /// `(answer, synthetic)` — the loop is done.
    Finish((String, bool)),
    /// A `handoff` action was dispatched; the step is recorded but the loop
    /// exits with no answer (spec.md section 4.1 step 12).
    HandedOff(ScratchpadStep),
    /// An ordinary tool step; `bool` is whether it errored (feeds
    /// `ErrorCount`).
    Continue(ScratchpadStep, bool),
}
