use std::sync::Arc;

use agentmesh::agent::core::{AgentConfig, AgentCore};
use agentmesh::agent::{AgentCard, Role};
use agentmesh::kvs::memory_kvs::InMemoryKvs;
use agentmesh::model::stub::StubModelClient;
use agentmesh::model::ModelClient;
use agentmesh::stream::memory_bus::InMemoryStreamBus;
use agentmesh::stream::StreamBus;
use agentmesh::termination::TerminationCondition;
use agentmesh::tools::ToolRegistry;
use agentmesh::Kvs;

#[tokio::test]
async fn error_count_condition_stops_the_loop_before_the_iteration_budget() {
    let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
    // The model keeps calling a tool that was never registered; every
    // iteration counts as an error, so `ErrorCount` should fire well before
    // the 10-iteration budget would.
    let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(vec![
        "Thought: trying\nAction: nonexistent\nAction Input: {}".to_string(),
        "Thought: trying again\nAction: nonexistent\nAction Input: {}".to_string(),
    ]));
    let stream: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::new());
    let tools = ToolRegistry::new();

    let card = AgentCard::new(Role::new("researcher"), "chat-1");
    let config = AgentConfig {
        max_iterations: 10,
        llm_timeout_secs: 5,
        termination_conditions: vec![TerminationCondition::ErrorCount { max_errors: 2 }],
        prompt_template: AgentConfig::DEFAULT_PROMPT_TEMPLATE.to_string(),
        model_name: None,
        scratchpad_memory_size: AgentConfig::DEFAULT_SCRATCHPAD_MEMORY_SIZE,
    };
    let agent = AgentCore::new(
        card, config, "tests error handling", kvs, model, stream, tools, None, None,
    );

    let finish = agent
        .run("do something", false)
        .await
        .unwrap()
        .expect("error-count termination should still produce a synthetic answer");
    assert_eq!(finish.iterations, 2);
    assert!(finish.synthetic);
}

#[tokio::test]
async fn scratchpad_history_is_replayed_into_the_prompt_on_a_fresh_agent_instance() {
    let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
    let stream: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::new());
    let card = AgentCard::new(Role::new("researcher"), "chat-1");

    let store = agentmesh::agent::scratchpad::ScratchpadStore::new(kvs.clone());
    store
        .append(
            "chat-1",
            &card.id,
            &agentmesh::agent::scratchpad::ScratchpadStep::action(
                Some("earlier I searched".to_string()),
                "search".to_string(),
                &serde_json::json!({"query": "rust"}),
                Some("found tokio and async-std".to_string()),
                "researcher",
                "exec-0".to_string(),
            ),
        )
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(vec![
        r#"{"thinking": "done", "tool": {"name": "final_answer", "params": {"answer": "tokio"}}}"#.to_string(),
    ]));
    let config = AgentConfig {
        max_iterations: 3,
        llm_timeout_secs: 5,
        termination_conditions: vec![TerminationCondition::ToolName {
            tool_names: vec!["final_answer".to_string()],
        }],
        prompt_template: AgentConfig::DEFAULT_PROMPT_TEMPLATE.to_string(),
        model_name: None,
        scratchpad_memory_size: AgentConfig::DEFAULT_SCRATCHPAD_MEMORY_SIZE,
    };
    let mut tools = ToolRegistry::new();
    tools
        .register(Arc::new(agentmesh::tools::builtin::final_answer::FinalAnswerTool::new()))
        .unwrap();

    let agent = AgentCore::new(
        card.clone(),
        config,
        "resumes where it left off",
        kvs.clone(),
        model,
        stream,
        tools,
        None,
        None,
    );

    let finish = agent
        .run("what should I use?", false)
        .await
        .unwrap()
        .expect("should finish with an answer");
    assert_eq!(finish.answer, "tokio");

    let history = agentmesh::agent::scratchpad::ScratchpadStore::new(kvs)
        .load("chat-1", &card.id)
        .await
        .unwrap();
    // The pre-existing step is still there, a fresh origin item was
    // prepended for this run, and the loop didn't need to append a new tool
    // step since it answered on the first try.
    assert_eq!(history.len(), 2);
    assert!(history[1].is_origin_query);
    assert_eq!(history[1].thought.as_deref(), Some("what should I use?"));
}
