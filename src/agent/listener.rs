//! The agent event listener: the loop that blocks on a role's shared queue
//! and this agent's own private queue, runs [`AgentCore`] against whichever
//! event wins the race, and forwards the outcome on.
//!
//! Grounded on the `BLPOP` loop confirmed in `proteus/src/agent/agent.py`,
//! adapted to this crate's async handoff model (spec.md section 4.10/4.11):
//! a `handoff` tool call makes [`AgentCore::run`] return `Ok(None)`
//! immediately rather than blocking in-process for a reply, so the listener
//! is what actually resumes a sender once the receiving role's agent
//! answers — by treating the incoming `is_result` event as a fresh (but
//! context-carrying) run of the same loop.
//!
//! Known limitation: a result event is delivered to the sender's *role*
//! queue, not to the specific agent instance that dispatched the handoff
//! (see [`crate::messaging::handoff_protocol`]). With exactly one instance
//! per role this is transparent; with `instances > 1` on a role that both
//! sends and receives handoffs, a different instance than the original
//! sender may pick up the reply and resume with an empty scratchpad. Chains
//! of handoffs more than two roles deep are not threaded back further than
//! the immediate sender for the same reason.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::instrument;

use crate::agent::core::AgentCore;
use crate::error::AgentMeshError;
use crate::kvs::Kvs;
use crate::messaging::{self, handoff_protocol, TeamEvent};

const POLL_TIMEOUT_SECS: f64 = 1.0;
const COORDINATOR_ROLE: &str = "coordinator";
/// `sender_role` used by [`crate::team::TeamOrchestrator::seed_task`] for the
/// very first task in a chat. A finished run whose originating event came
/// from this sender has no one left to report back to.
const ROOT_SENDER_ROLE: &str = "orchestrator";

pub struct AgentEventListener {
    core: AgentCore,
    kvs: Arc<dyn Kvs>,
    stop_flag: Arc<AtomicBool>,
}

impl AgentEventListener {
    pub fn new(core: AgentCore, kvs: Arc<dyn Kvs>) -> Self {
        let stop_flag = core.stop_handle();
        AgentEventListener {
            core,
            kvs,
            stop_flag,
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Runs until `stop()` is called (via the shared stop flag), polling
    /// this agent's private queue and its role's shared queue and
    /// processing one event at a time.
    #[instrument(skip(self), fields(agent_id = %self.core.card.id, role = %self.core.card.role))]
    pub async fn listen(&self) -> Result<(), AgentMeshError> {
        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                return Ok(());
            }

            let event = match messaging::next_for_role_or_agent(
                self.kvs.as_ref(),
                self.core.card.role.as_str(),
                &self.core.card.id,
                POLL_TIMEOUT_SECS,
            )
            .await?
            {
                Some(event) => event,
                None => continue,
            };

            self.process(event).await?;
        }
    }

    async fn process(&self, event: TeamEvent) -> Result<(), AgentMeshError> {
        if event.role != self.core.card.role.as_str() {
            messaging::record_dropped_event();
            tracing::warn!(
                event_role = %event.role,
                own_role = %self.core.card.role,
                event_id = %event.event_id,
                "dropping event addressed to a different role"
            );
            return Ok(());
        }

        let outcome = if event.is_result {
            self.process_result(&event).await
        } else {
            self.process_task(&event).await
        };

        match outcome {
            Ok(Some(finish)) => {
                // Only a fresh task's finish can be reported back: `event`
                // carries the sender we'd reply to. A result event's own
                // `sender_role` names whoever sent *that* reply, not anyone
                // waiting on this run, so a finish reached via
                // `process_result` has nowhere well-defined to report to
                // (see the module doc comment's two-hop limitation).
                if !event.is_result && event.sender_role != ROOT_SENDER_ROLE {
                    let result_event = handoff_protocol::build_result_event(
                        &event,
                        &self.core.card.id,
                        self.core.card.role.as_str(),
                        &finish,
                    );
                    messaging::publish_to_role(self.kvs.as_ref(), &result_event).await?;
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => self.report_error(&event, &err).await,
        }
    }

    /// A fresh task: the event's own `query` field (direct seeding) or the
    /// `{task, description, context}` shape a `handoff` dispatch builds.
    async fn process_task(&self, event: &TeamEvent) -> Result<Option<String>, AgentMeshError> {
        self.core.clear_context().await?;
        let query = task_query(&event.payload);
        Ok(self.core.run(&query, false).await?.map(|f| f.answer))
    }

    /// A handoff reply: record it as a scratchpad step and resume the loop
    /// in-place, without a new origin item.
    async fn process_result(&self, event: &TeamEvent) -> Result<Option<String>, AgentMeshError> {
        self.core.receive_result(&event.payload).await?;
        let query = "A result you were waiting on has arrived. Continue working toward the \
            original task using it, or call `final_answer` if it's enough to finish."
            .to_string();
        Ok(self.core.run(&query, true).await?.map(|f| f.answer))
    }

    /// Routes an unrecoverable run error to every agent serving the
    /// coordinator role, mirroring `agent.py`'s escalation path.
    async fn report_error(
        &self,
        original: &TeamEvent,
        err: &AgentMeshError,
    ) -> Result<(), AgentMeshError> {
        let error_event = TeamEvent::new_task(
            original.chat_id.clone(),
            COORDINATOR_ROLE,
            self.core.card.id.clone(),
            self.core.card.role.to_string(),
            serde_json::json!({
                "error": err.to_string(),
                "original_event_id": original.event_id,
            }),
        );
        messaging::publish_to_role(self.kvs.as_ref(), &error_event).await?;
        Ok(())
    }
}

/// Extracts the natural-language query for a fresh task event: a direct
/// `query` string (orchestrator seeding), or `task`/`description` joined
/// (handoff dispatch), falling back to the raw payload.
fn task_query(payload: &serde_json::Value) -> String {
    if let Some(query) = payload.get("query").and_then(|v| v.as_str()) {
        return query.to_string();
    }
    if let Some(task) = payload.get("task").and_then(|v| v.as_str()) {
        let description = payload.get("description").and_then(|v| v.as_str()).unwrap_or("");
        return if description.is_empty() {
            task.to_string()
        } else {
            format!("{task}: {description}")
        };
    }
    payload.to_string()
}
