//! Inter-agent messaging fabric: role-addressed queues and the team events
//! that travel across them.
//!
//! Grounded on `proteus/src/manager/multi_agent_manager.py` (event shape,
//! role/agent registries) and the real queue mechanics confirmed in
//! `proteus/src/agent/agent.py` (`BLPOP` against both `role_queue:<role>` and
//! `agent_queue:<id>`, `RPUSH` for delivery). A role's members share one
//! mailbox (`role_queue:<role>`) rather than each getting a copy — only the
//! agent that actually wins the `BLPOP` race processes a given task, which
//! is what makes `instances: N` function as a worker pool instead of N
//! agents redundantly doing the same work. `role_agents:<role>` still tracks
//! membership (used to decide whether a role has anyone registered at all),
//! but it is not a fan-out list.

pub mod handoff_protocol;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::kvs::{agent_queue_key, role_agents_key, role_queue_key, team_agents_key, Kvs};
use crate::utilities::errors::KvsError;

/// Process-wide count of events a listener dropped because their `role`
/// didn't match the consuming agent's own role (spec.md section 4.11 step 2
/// / section 8's "an event with role != consumer.role is dropped" testable
/// property). Exposed for tests and diagnostics; not reset between runs.
static DROPPED_EVENTS: AtomicU64 = AtomicU64::new(0);

/// Returns the current count of dropped mismatched-role events.
pub fn dropped_event_count() -> u64 {
    DROPPED_EVENTS.load(Ordering::Relaxed)
}

/// Records one more dropped event; called by a listener when it pulls an
/// event off its queues whose `role` doesn't match its own.
pub fn record_dropped_event() {
    DROPPED_EVENTS.fetch_add(1, Ordering::Relaxed);
}

/// A message traveling through the role/agent queue fabric: a task handed to
/// a role, or a result handed back to its sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEvent {
    pub event_id: String,
    pub chat_id: String,
    /// Higher fires first when an agent drains more than one queued event at
    /// once (spec.md section 5); ordinary task events use `0`.
    pub priority: i32,
    pub role: String,
    pub sender_id: String,
    pub sender_role: String,
    pub payload: Value,
    pub is_result: bool,
}

impl TeamEvent {
    pub fn new_task(
        chat_id: impl Into<String>,
        role: impl Into<String>,
        sender_id: impl Into<String>,
        sender_role: impl Into<String>,
        payload: Value,
    ) -> Self {
        TeamEvent {
            event_id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            priority: 0,
            role: role.into(),
            sender_id: sender_id.into(),
            sender_role: sender_role.into(),
            payload,
            is_result: false,
        }
    }

    pub fn as_result(mut self) -> Self {
        self.is_result = true;
        self
    }
}

fn serialize(event: &TeamEvent) -> Result<String, KvsError> {
    serde_json::to_string(event).map_err(|e| KvsError::Operation {
        message: format!("failed to serialize team event: {e}"),
    })
}

fn deserialize(raw: &str) -> Result<TeamEvent, KvsError> {
    serde_json::from_str(raw).map_err(|e| KvsError::Deserialize {
        key: "team_event".to_string(),
        message: e.to_string(),
    })
}

/// Publishes `event` to the single shared mailbox for `event.role`
/// (`role_queue:<role>`) — whichever of that role's members calls `BLPOP`
/// first picks it up. This is the only delivery path for task events; see
/// the module doc comment for why a fan-out-to-every-member design would be
/// wrong for an `instances: N` worker pool.
pub async fn publish_to_role(kvs: &dyn Kvs, event: &TeamEvent) -> Result<(), KvsError> {
    let serialized = serialize(event)?;
    kvs.rpush(&role_queue_key(&event.role), serialized).await
}

/// Delivers `event` directly to one agent's private queue (used for result
/// events, which always go back to the specific sender that asked).
pub async fn publish_to_agent(
    kvs: &dyn Kvs,
    agent_id: &str,
    event: &TeamEvent,
) -> Result<(), KvsError> {
    let serialized = serialize(event)?;
    kvs.rpush(&agent_queue_key(agent_id), serialized).await
}

/// Blocks (with the given poll timeout) for the next event addressed to
/// `agent_id`'s private queue.
pub async fn next_for_agent(
    kvs: &dyn Kvs,
    agent_id: &str,
    timeout_secs: f64,
) -> Result<Option<TeamEvent>, KvsError> {
    let key = agent_queue_key(agent_id);
    match kvs.blpop(&[key], timeout_secs).await? {
        Some((_, raw)) => deserialize(&raw).map(Some),
        None => Ok(None),
    }
}

/// Blocks for the next event addressed either to `agent_id`'s private queue
/// (result events, delivered directly) or to `role`'s shared queue (task
/// events, contested with the rest of the role's members). The private
/// queue is checked first in the key list so a waiting result can't starve
/// behind a burst of new tasks — `BLPOP` still returns whichever key has an
/// item, in the order its backend happens to serve them, but ties go to the
/// first key listed.
pub async fn next_for_role_or_agent(
    kvs: &dyn Kvs,
    role: &str,
    agent_id: &str,
    timeout_secs: f64,
) -> Result<Option<TeamEvent>, KvsError> {
    let keys = vec![agent_queue_key(agent_id), role_queue_key(role)];
    match kvs.blpop(&keys, timeout_secs).await? {
        Some((_, raw)) => deserialize(&raw).map(Some),
        None => Ok(None),
    }
}

/// Registers `agent_id` as currently serving `role` (`role_agents:<role>`)
/// and as part of the chat's roster (`team_agents:<chat_id>`).
pub async fn register_agent(
    kvs: &dyn Kvs,
    chat_id: &str,
    role: &str,
    agent_id: &str,
) -> Result<(), KvsError> {
    kvs.rpush(&role_agents_key(role), agent_id.to_string())
        .await?;
    kvs.rpush(&team_agents_key(chat_id), agent_id.to_string())
        .await?;
    kvs.expire(&team_agents_key(chat_id), 24 * 3600).await
}

/// Removes `agent_id` from its role's membership list, e.g. when an agent
/// shuts down.
pub async fn deregister_agent(kvs: &dyn Kvs, role: &str, agent_id: &str) -> Result<(), KvsError> {
    kvs.lrem(&role_agents_key(role), 0, agent_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::memory_kvs::InMemoryKvs;

    #[tokio::test]
    async fn publish_to_role_delivers_to_the_shared_mailbox_only() {
        let kvs = InMemoryKvs::new();
        register_agent(&kvs, "chat-1", "researcher", "agent-a")
            .await
            .unwrap();
        register_agent(&kvs, "chat-1", "researcher", "agent-b")
            .await
            .unwrap();

        let event = TeamEvent::new_task("chat-1", "researcher", "agent-z", "coordinator", Value::Null);
        publish_to_role(&kvs, &event).await.unwrap();

        // Neither member's private queue gets a copy...
        assert!(next_for_agent(&kvs, "agent-a", 0.05).await.unwrap().is_none());
        assert!(next_for_agent(&kvs, "agent-b", 0.05).await.unwrap().is_none());
        // ...only one shared queue entry exists, for whoever polls it first.
        let queued = kvs.lrange(&role_queue_key("researcher"), 0, -1).await.unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test]
    async fn publish_to_role_works_even_with_no_registered_members_yet() {
        let kvs = InMemoryKvs::new();
        let event = TeamEvent::new_task("chat-1", "researcher", "agent-z", "coordinator", Value::Null);
        publish_to_role(&kvs, &event).await.unwrap();
        let queued = kvs.lrange(&role_queue_key("researcher"), 0, -1).await.unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test]
    async fn next_for_role_or_agent_prefers_the_private_queue() {
        let kvs = InMemoryKvs::new();
        let role_event =
            TeamEvent::new_task("chat-1", "researcher", "agent-z", "coordinator", Value::Null);
        let result_event = TeamEvent::new_task(
            "chat-1",
            "coordinator",
            "agent-r",
            "researcher",
            Value::Null,
        )
        .as_result();

        publish_to_role(&kvs, &role_event).await.unwrap();
        publish_to_agent(&kvs, "agent-a", &result_event).await.unwrap();

        let received = next_for_role_or_agent(&kvs, "researcher", "agent-a", 0.05)
            .await
            .unwrap()
            .unwrap();
        assert!(received.is_result);
        assert_eq!(received.event_id, result_event.event_id);
    }

    #[tokio::test]
    async fn next_for_role_or_agent_picks_up_a_role_task_when_private_queue_is_empty() {
        let kvs = InMemoryKvs::new();
        let event = TeamEvent::new_task("chat-1", "researcher", "agent-z", "coordinator", Value::Null);
        publish_to_role(&kvs, &event).await.unwrap();

        let received = next_for_role_or_agent(&kvs, "researcher", "agent-a", 0.05)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_id, event.event_id);
    }

    #[test]
    fn record_dropped_event_increments_the_shared_counter() {
        let before = dropped_event_count();
        record_dropped_event();
        assert_eq!(dropped_event_count(), before + 1);
    }

    #[tokio::test]
    async fn deregister_removes_from_membership() {
        let kvs = InMemoryKvs::new();
        register_agent(&kvs, "chat-1", "researcher", "agent-a")
            .await
            .unwrap();
        deregister_agent(&kvs, "researcher", "agent-a").await.unwrap();
        let members = kvs.lrange(&role_agents_key("researcher"), 0, -1).await.unwrap();
        assert!(members.is_empty());
    }
}
