use std::sync::Arc;

use agentmesh::kvs::memory_kvs::InMemoryKvs;
use agentmesh::Kvs;

#[tokio::test]
async fn scratchpad_survives_a_simulated_restart() {
    let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());

    {
        let store = agentmesh::agent::scratchpad::ScratchpadStore::new(kvs.clone());
        store
            .append(
                "chat-1",
                "agent-1",
                &agentmesh::agent::scratchpad::ScratchpadStep::action(
                    Some("let's search".to_string()),
                    "search".to_string(),
                    &serde_json::json!({"query": "rust"}),
                    Some("3 hits".to_string()),
                    "researcher",
                    "exec-1".to_string(),
                ),
            )
            .await
            .unwrap();
    }

    // A fresh store over the same KVS handle stands in for the process
    // restarting — the history should still be there.
    let reloaded_store = agentmesh::agent::scratchpad::ScratchpadStore::new(kvs.clone());
    let history = reloaded_store.load("chat-1", "agent-1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tool.as_deref(), Some("search"));
}

#[tokio::test]
async fn conversation_at_100_entries_drops_the_leftmost_on_insert() {
    let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
    let store = agentmesh::agent::conversation::ConversationStore::new(kvs);

    for i in 0..100 {
        store
            .append(
                "chat-1",
                &agentmesh::agent::conversation::ConversationTurn {
                    role: "user".to_string(),
                    content: format!("turn {i}"),
                    agent_id: None,
                },
            )
            .await
            .unwrap();
    }

    let history = store.load("chat-1").await.unwrap();
    assert_eq!(history.len(), 100);
    assert_eq!(history.first().unwrap().content, "turn 0");

    store
        .append(
            "chat-1",
            &agentmesh::agent::conversation::ConversationTurn {
                role: "user".to_string(),
                content: "turn 100".to_string(),
                agent_id: None,
            },
        )
        .await
        .unwrap();

    let history = store.load("chat-1").await.unwrap();
    assert_eq!(history.len(), 100, "length stays capped at 100");
    assert_eq!(
        history.first().unwrap().content,
        "turn 1",
        "oldest entry (turn 0) is dropped"
    );
    assert_eq!(history.last().unwrap().content, "turn 100");
}

#[tokio::test]
async fn scratchpad_is_isolated_per_agent_within_a_chat() {
    let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
    let store = agentmesh::agent::scratchpad::ScratchpadStore::new(kvs);

    let step = agentmesh::agent::scratchpad::ScratchpadStep::action(
        None,
        "echo".to_string(),
        &serde_json::Value::Null,
        Some("ok".to_string()),
        "researcher",
        "exec-1".to_string(),
    );
    store.append("chat-1", "agent-a", &step).await.unwrap();

    let other_agent_history = store.load("chat-1", "agent-b").await.unwrap();
    assert!(other_agent_history.is_empty());
}
