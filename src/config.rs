//! Declarative team configuration, loaded from YAML: a map of role name to
//! role config (tools, prompt template, model, termination conditions,
//! iteration/timeout budgets).

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AgentMeshError;
use crate::termination::TerminationCondition;

/// Per-role configuration: which tools it has, how it's prompted, which
/// model it calls, and when its loop should stop.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// Human-readable description folded into the team's composed
    /// description (see [`crate::team::TeamOrchestrator::compose_team_description`]).
    #[serde(default)]
    pub description: String,

    /// Names of built-in or registered tools this role may call.
    #[serde(default)]
    pub tools: Vec<String>,

    /// Overrides the system prompt template; falls back to a generic ReAct
    /// template when absent.
    pub prompt_template: Option<String>,

    /// Overrides the team-wide default model for this role.
    pub model_name: Option<String>,

    #[serde(default)]
    pub termination_conditions: Vec<TerminationCondition>,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Maximum number of most-recent scratchpad steps replayed into this
    /// role's prompt (spec.md section 3's "memory size").
    #[serde(default = "default_scratchpad_memory_size")]
    pub scratchpad_memory_size: usize,

    /// Number of agent instances to spin up serving this role at team
    /// startup (spec.md section 5: a role may be staffed by more than one
    /// agent).
    #[serde(default = "default_instances")]
    pub instances: u32,

    /// Free-form labels carried onto each instance's `AgentCard` (spec.md
    /// section 3's agent identity data model); not interpreted by the
    /// runtime itself.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_max_iterations() -> u32 {
    15
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_scratchpad_memory_size() -> usize {
    crate::agent::core::AgentConfig::DEFAULT_SCRATCHPAD_MEMORY_SIZE
}

fn default_instances() -> u32 {
    1
}

/// A full team: the roles that compose it and the chat/session it belongs
/// to.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    pub chat_id: String,
    pub default_model_name: String,
    pub roles: HashMap<String, RoleConfig>,
    /// Overrides the auto-composed team description (see
    /// [`crate::team::TeamOrchestrator::compose_team_description`]).
    pub description: Option<String>,
}

impl TeamConfig {
    pub fn from_yaml(source: &str) -> Result<Self, AgentMeshError> {
        serde_yaml::from_str(source).map_err(|e| AgentMeshError::Config(e.to_string()))
    }

    /// Role names with no configured role must fail fast rather than
    /// silently staffing zero agents — this validates the config carries at
    /// least one role before a team tries to start.
    pub fn validate(&self) -> Result<(), AgentMeshError> {
        if self.roles.is_empty() {
            return Err(AgentMeshError::Config(
                "team config must declare at least one role".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_team_config() {
        let yaml = r#"
chat_id: "chat-1"
default_model_name: "stub-model"
description: "a two-role research team"
roles:
  coordinator:
    description: "routes tasks to the right specialist"
    tools: ["handoff", "final_answer"]
    max_iterations: 10
    termination_conditions:
      - type: ToolName
        tool_names: ["final_answer"]
  researcher:
    description: "looks things up"
    tools: ["search", "final_answer"]
    termination_conditions:
      - type: Composite
        mode: any
        conditions:
          - type: ToolName
            tool_names: ["final_answer"]
          - type: StepLimit
            max_steps: 20
"#;
        let config = TeamConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.roles.len(), 2);
        let coordinator = &config.roles["coordinator"];
        assert_eq!(coordinator.max_iterations, 10);
        assert_eq!(coordinator.tools, vec!["handoff", "final_answer"]);
    }

    #[test]
    fn rejects_config_with_no_roles() {
        let yaml = r#"
chat_id: "chat-1"
default_model_name: "stub-model"
roles: {}
"#;
        let config = TeamConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
