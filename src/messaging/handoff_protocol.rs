//! The handoff protocol: how one agent hands a task to another role and
//! resumes, later and asynchronously, once the result comes back.
//!
//! Grounded on `proteus/src/nodes/handoff.py`'s task/result event shapes,
//! adapted to this crate's listener-driven resumption model (see
//! [`crate::agent::listener`]): a `handoff` action builds a task-shaped
//! [`TeamEvent`] and publishes it to the target role's shared queue, then
//! the sending agent's loop exits immediately with no answer. The result
//! comes back later as its own event, routed to the sender's *role* queue
//! (not directly to the sender agent) so the team still works if the
//! sending agent instance has since been replaced — spec.md section 4.10.

use chrono::Utc;
use serde_json::Value;

use super::TeamEvent;

/// Builds the task event a `handoff` tool call publishes to `target_role`.
/// `task` and `description` are carried as separate fields so the receiving
/// role's prompt can distinguish "what to do" from "why", and `context` is
/// an optional free-form payload the sender wants echoed back.
pub fn build_task_event(
    chat_id: &str,
    target_role: &str,
    sender_id: &str,
    sender_role: &str,
    task: &str,
    description: &str,
    context: Option<Value>,
) -> TeamEvent {
    TeamEvent::new_task(
        chat_id,
        target_role,
        sender_id,
        sender_role,
        serde_json::json!({
            "task": task,
            "description": description,
            "context": context.unwrap_or(Value::Null),
        }),
    )
}

/// Builds the result event the receiving agent (`responder_id`,
/// `responder_role`) publishes back once it has a final answer. Delivery is
/// to `original.sender_role`'s shared queue (see [`super::publish_to_role`]),
/// since by the time the result arrives the original sender agent may no
/// longer be the one polling that role.
///
/// `metadata` carries `origin_query` (threaded through from the task event's
/// own `context.origin_query`, if the sender set one), `original_event_id`,
/// `agent_id`, and a `timestamp` stamped at build time, per spec.md sections
/// 3 and 4.9's team event data model.
pub fn build_result_event(
    original: &TeamEvent,
    responder_id: &str,
    responder_role: &str,
    result: &str,
) -> TeamEvent {
    let task = original.payload.get("task").cloned().unwrap_or(Value::Null);
    let description = original
        .payload
        .get("description")
        .cloned()
        .unwrap_or(Value::Null);
    let origin_query = original
        .payload
        .get("context")
        .and_then(|context| context.get("origin_query"))
        .cloned()
        .unwrap_or(Value::Null);

    TeamEvent::new_task(
        original.chat_id.clone(),
        original.sender_role.clone(),
        responder_id,
        responder_role,
        serde_json::json!({
            "context": {
                "result": result,
                "task": task,
                "description": description,
            },
            "metadata": {
                "origin_query": origin_query,
                "original_event_id": original.event_id,
                "agent_id": responder_id,
                "timestamp": Utc::now().to_rfc3339(),
            },
        }),
    )
    .as_result()
}
