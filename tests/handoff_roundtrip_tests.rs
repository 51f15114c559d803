use std::sync::Arc;
use std::time::Duration;

use agentmesh::agent::core::{AgentConfig, AgentCore};
use agentmesh::agent::listener::AgentEventListener;
use agentmesh::agent::{AgentCard, Role};
use agentmesh::kvs::memory_kvs::InMemoryKvs;
use agentmesh::model::stub::StubModelClient;
use agentmesh::model::ModelClient;
use agentmesh::stream::memory_bus::InMemoryStreamBus;
use agentmesh::stream::StreamBus;
use agentmesh::termination::TerminationCondition;
use agentmesh::tools::builtin::echo::EchoTool;
use agentmesh::tools::builtin::final_answer::FinalAnswerTool;
use agentmesh::tools::builtin::handoff::HandoffTool;
use agentmesh::tools::ToolRegistry;
use agentmesh::Kvs;

fn by_final_answer() -> Vec<TerminationCondition> {
    vec![TerminationCondition::ToolName {
        tool_names: vec!["final_answer".to_string()],
    }]
}

/// End-to-end: the coordinator hands a task off to the researcher and never
/// blocks doing it; the researcher answers on its own schedule; the
/// coordinator's loop resumes asynchronously once the reply lands on its
/// role's shared queue, and relays a final answer of its own. Asserted via
/// the stream bus's `agent_complete` events rather than a direct return
/// value, since `run()` returns `None` the moment the handoff is dispatched.
#[tokio::test]
async fn coordinator_handoff_resumes_once_researcher_replies() {
    let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
    let stream = Arc::new(InMemoryStreamBus::new());
    let stream_dyn: Arc<dyn StreamBus> = stream.clone();

    let coordinator_card = AgentCard::new(Role::new("coordinator"), "chat-1");
    let researcher_card = AgentCard::new(Role::new("researcher"), "chat-1");

    agentmesh::messaging::register_agent(
        kvs.as_ref(),
        "chat-1",
        "researcher",
        &researcher_card.id,
    )
    .await
    .unwrap();
    agentmesh::messaging::register_agent(
        kvs.as_ref(),
        "chat-1",
        "coordinator",
        &coordinator_card.id,
    )
    .await
    .unwrap();

    // The researcher is a plain listener: it answers anything with a fixed
    // final_answer.
    let mut researcher_tools = ToolRegistry::new();
    researcher_tools.register(Arc::new(FinalAnswerTool::new())).unwrap();
    researcher_tools.register(Arc::new(EchoTool::new())).unwrap();
    let researcher_model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(vec![
        r#"{"thinking": "done", "tool": {"name": "final_answer", "params": {"answer": "rust async runtimes: tokio, async-std"}}}"#
            .to_string(),
    ]));
    let researcher_core = AgentCore::new(
        researcher_card.clone(),
        AgentConfig {
            max_iterations: 3,
            llm_timeout_secs: 5,
            termination_conditions: by_final_answer(),
            prompt_template: AgentConfig::DEFAULT_PROMPT_TEMPLATE.to_string(),
            model_name: None,
            scratchpad_memory_size: AgentConfig::DEFAULT_SCRATCHPAD_MEMORY_SIZE,
        },
        "looks things up",
        kvs.clone(),
        researcher_model,
        stream_dyn.clone(),
        researcher_tools,
        None,
        None,
    );
    let researcher_listener = AgentEventListener::new(researcher_core, kvs.clone());
    let researcher_stop = researcher_listener.stop_handle();
    let researcher_handle = tokio::spawn(async move {
        let _ = researcher_listener.listen().await;
    });

    // The coordinator calls `handoff` once, then relays whatever comes back
    // as its own final answer.
    let mut coordinator_tools = ToolRegistry::new();
    coordinator_tools.register(Arc::new(FinalAnswerTool::new())).unwrap();
    coordinator_tools
        .register(Arc::new(HandoffTool::new(
            kvs.clone(),
            "chat-1",
            coordinator_card.id.clone(),
            "coordinator",
        )))
        .unwrap();
    let coordinator_model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(vec![
        r#"{"thinking": "delegate", "tool": {"name": "handoff", "params": {"target_role": "researcher", "task": "rust async runtimes", "description": "need options for the report"}}}"#.to_string(),
        r#"{"thinking": "done", "tool": {"name": "final_answer", "params": {"answer": "relayed"}}}"#.to_string(),
    ]));
    let coordinator_core = AgentCore::new(
        coordinator_card.clone(),
        AgentConfig {
            max_iterations: 3,
            llm_timeout_secs: 5,
            termination_conditions: by_final_answer(),
            prompt_template: AgentConfig::DEFAULT_PROMPT_TEMPLATE.to_string(),
            model_name: None,
            scratchpad_memory_size: AgentConfig::DEFAULT_SCRATCHPAD_MEMORY_SIZE,
        },
        "routes tasks",
        kvs.clone(),
        coordinator_model,
        stream_dyn,
        coordinator_tools,
        None,
        None,
    );
    let coordinator_listener = AgentEventListener::new(coordinator_core, kvs.clone());
    let coordinator_stop = coordinator_listener.stop_handle();
    let coordinator_handle = tokio::spawn(async move {
        let _ = coordinator_listener.listen().await;
    });

    // Seed the root task onto the coordinator's role queue, as the
    // orchestrator would.
    let seed = agentmesh::messaging::TeamEvent::new_task(
        "chat-1",
        "coordinator",
        "orchestrator",
        "orchestrator",
        serde_json::json!({ "query": "help me out" }),
    );
    agentmesh::messaging::publish_to_role(kvs.as_ref(), &seed)
        .await
        .unwrap();

    // Poll the stream bus for the coordinator's agent_complete event rather
    // than blocking on a direct return value — the whole point of the
    // async handoff model is that nothing is waiting inline.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut relayed_answer = None;
    while tokio::time::Instant::now() < deadline {
        let events = stream.events_for("chat-1");
        if let Some(event) = events.iter().find(|e| {
            e.event == "agent_complete"
                && e.data.get("agent_id").and_then(|v| v.as_str()) == Some(coordinator_card.id.as_str())
        }) {
            relayed_answer = event.data.get("answer").and_then(|v| v.as_str()).map(String::from);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(relayed_answer.as_deref(), Some("relayed"));

    researcher_stop.store(true, std::sync::atomic::Ordering::SeqCst);
    coordinator_stop.store(true, std::sync::atomic::Ordering::SeqCst);
    researcher_handle.abort();
    coordinator_handle.abort();
}
