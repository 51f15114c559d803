use agentmesh::TeamConfig;
use std::time::Instant;

#[test]
fn termination_conditions_round_trip_through_yaml_and_evaluate() {
    let yaml = r#"
chat_id: "chat-1"
default_model_name: "stub-model"
roles:
  worker:
    description: "does the work"
    tools: ["final_answer"]
    termination_conditions:
      - type: Composite
        mode: all
        conditions:
          - type: StepLimit
            max_steps: 3
          - type: TextMatch
            mode: final_answer
            pattern: "done"
"#;
    let config = TeamConfig::from_yaml(yaml).unwrap();
    let worker = &config.roles["worker"];
    assert_eq!(worker.termination_conditions.len(), 1);

    let errors = agentmesh::termination::ErrorCounter::new();
    let ctx_not_yet = agentmesh::termination::TerminationContext {
        iteration: 3,
        tool_name: None,
        final_answer: Some("still working"),
        thought: None,
        observation: None,
        started_at: Instant::now(),
        tool_errored: false,
    };
    assert!(!worker.termination_conditions[0].should_terminate(&ctx_not_yet, &errors));

    let ctx_done = agentmesh::termination::TerminationContext {
        final_answer: Some("the task is done"),
        ..ctx_not_yet
    };
    assert!(worker.termination_conditions[0].should_terminate(&ctx_done, &errors));
}
