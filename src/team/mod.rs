//! The team orchestrator: turns a [`TeamConfig`] into running agents,
//! registers them on the role/agent queues, and seeds the initial task.
//!
//! Grounded on `proteus/src/manager/team_manager.py`'s
//! `_validate_and_normalize_config` (default team description composed from
//! each role's own description when none is given) and
//! `multi_agent_manager.py`'s agent bring-up sequence (build agent, register
//! role membership, start its listener).

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::agent::core::{AgentConfig, AgentCore};
use crate::agent::listener::AgentEventListener;
use crate::agent::{register_role, AgentCard, Role};
use crate::config::TeamConfig;
use crate::error::AgentMeshError;
use crate::kvs::Kvs;
use crate::messaging::{self, TeamEvent};
use crate::model::ModelClient;
use crate::playbook::PlaybookGenerator;
use crate::stream::StreamBus;
use crate::tools::builtin::echo::EchoTool;
use crate::tools::builtin::final_answer::FinalAnswerTool;
use crate::tools::builtin::handoff::HandoffTool;
use crate::tools::memory::ToolMemoryManager;
use crate::tools::ToolRegistry;

pub struct TeamOrchestrator {
    config: TeamConfig,
    kvs: Arc<dyn Kvs>,
    model: Arc<dyn ModelClient>,
    stream: Arc<dyn StreamBus>,
}

impl TeamOrchestrator {
    pub fn new(
        config: TeamConfig,
        kvs: Arc<dyn Kvs>,
        model: Arc<dyn ModelClient>,
        stream: Arc<dyn StreamBus>,
    ) -> Self {
        TeamOrchestrator {
            config,
            kvs,
            model,
            stream,
        }
    }

    /// The team-wide description shown to every agent's prompt: the
    /// config's override if present, else each role's own description
    /// joined together.
    pub fn compose_team_description(&self) -> String {
        if let Some(description) = &self.config.description {
            return description.clone();
        }
        let mut roles: Vec<&String> = self.config.roles.keys().collect();
        roles.sort();
        roles
            .into_iter()
            .map(|name| {
                let role_cfg = &self.config.roles[name];
                format!("{name}: {}", role_cfg.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Builds one [`AgentEventListener`] per configured instance of every
    /// role, registering each agent's membership in the role/chat queues as
    /// it's created.
    pub async fn build_agents(&self) -> Result<Vec<AgentEventListener>, AgentMeshError> {
        self.config.validate()?;
        let mut listeners = Vec::new();

        for (role_name, role_cfg) in &self.config.roles {
            let role = Role::new(role_name);
            register_role(&role);

            for _ in 0..role_cfg.instances.max(1) {
                let card = AgentCard::new(role.clone(), self.config.chat_id.clone()).with_profile(
                    role_cfg.description.clone(),
                    role_cfg
                        .model_name
                        .clone()
                        .or_else(|| Some(self.config.default_model_name.clone())),
                    role_cfg.tags.clone(),
                );
                messaging::register_agent(
                    self.kvs.as_ref(),
                    &self.config.chat_id,
                    role.as_str(),
                    &card.id,
                )
                .await?;

                let mut tools = ToolRegistry::new();
                for tool_name in &role_cfg.tools {
                    self.register_builtin_tool(&mut tools, tool_name, &card)?;
                }

                let agent_config = AgentConfig {
                    max_iterations: role_cfg.max_iterations,
                    llm_timeout_secs: role_cfg.llm_timeout_secs,
                    termination_conditions: role_cfg.termination_conditions.clone(),
                    prompt_template: role_cfg
                        .prompt_template
                        .clone()
                        .unwrap_or_else(|| AgentConfig::DEFAULT_PROMPT_TEMPLATE.to_string()),
                    model_name: role_cfg
                        .model_name
                        .clone()
                        .or_else(|| Some(self.config.default_model_name.clone())),
                    scratchpad_memory_size: role_cfg.scratchpad_memory_size,
                };

                let tool_memory = Some(Arc::new(ToolMemoryManager::new(
                    self.kvs.clone(),
                    self.model.clone(),
                )));
                let playbook = Some(Arc::new(PlaybookGenerator::new(
                    self.kvs.clone(),
                    self.model.clone(),
                )));

                let core = AgentCore::new(
                    card,
                    agent_config,
                    role_cfg.description.clone(),
                    self.kvs.clone(),
                    self.model.clone(),
                    self.stream.clone(),
                    tools,
                    tool_memory,
                    playbook,
                );
                listeners.push(AgentEventListener::new(core, self.kvs.clone()));
            }
        }

        Ok(listeners)
    }

    fn register_builtin_tool(
        &self,
        tools: &mut ToolRegistry,
        name: &str,
        card: &AgentCard,
    ) -> Result<(), AgentMeshError> {
        let tool: Arc<dyn crate::tools::Tool> = match name {
            "final_answer" => Arc::new(FinalAnswerTool::new()),
            "echo" => Arc::new(EchoTool::new()),
            "handoff" => Arc::new(HandoffTool::new(
                self.kvs.clone(),
                card.chat_id.clone(),
                card.id.clone(),
                card.role.to_string(),
            )),
            other => {
                return Err(AgentMeshError::Config(format!(
                    "unknown built-in tool '{other}' — register a custom tool before building the team"
                )))
            }
        };
        tools
            .register(tool)
            .map_err(AgentMeshError::from)
    }

    /// Publishes the initial task to `target_role`'s queue.
    pub async fn seed_task(
        &self,
        target_role: &str,
        query: serde_json::Value,
    ) -> Result<(), AgentMeshError> {
        let event = TeamEvent::new_task(
            self.config.chat_id.clone(),
            target_role,
            "orchestrator",
            "orchestrator",
            query,
        );
        messaging::publish_to_role(self.kvs.as_ref(), &event).await?;
        Ok(())
    }

    /// Spawns every listener's `listen()` loop as a background task and
    /// returns their join handles so a caller (typically the CLI) can await
    /// shutdown.
    pub fn spawn_all(listeners: Vec<AgentEventListener>) -> Vec<JoinHandle<()>> {
        listeners
            .into_iter()
            .map(|listener| {
                tokio::spawn(async move {
                    if let Err(err) = listener.listen().await {
                        tracing::error!(error = %err, "agent listener exited with error");
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::memory_kvs::InMemoryKvs;
    use crate::model::stub::StubModelClient;
    use crate::stream::memory_bus::InMemoryStreamBus;

    fn sample_config() -> TeamConfig {
        let yaml = r#"
chat_id: "chat-1"
default_model_name: "stub-model"
roles:
  coordinator:
    description: "routes tasks"
    tools: ["handoff", "final_answer"]
    termination_conditions:
      - type: ToolName
        tool_names: ["final_answer"]
  researcher:
    description: "looks things up"
    tools: ["echo", "final_answer"]
    instances: 2
    termination_conditions:
      - type: ToolName
        tool_names: ["final_answer"]
"#;
        TeamConfig::from_yaml(yaml).unwrap()
    }

    #[tokio::test]
    async fn build_agents_creates_one_listener_per_instance() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(Vec::<String>::new()));
        let stream: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::new());
        let orchestrator = TeamOrchestrator::new(sample_config(), kvs.clone(), model, stream);

        let listeners = orchestrator.build_agents().await.unwrap();
        assert_eq!(listeners.len(), 3);

        let researchers = kvs
            .lrange(&crate::kvs::role_agents_key("researcher"), 0, -1)
            .await
            .unwrap();
        assert_eq!(researchers.len(), 2);
    }

    #[test]
    fn compose_team_description_falls_back_to_role_descriptions() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(Vec::<String>::new()));
        let stream: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::new());
        let orchestrator = TeamOrchestrator::new(sample_config(), kvs, model, stream);
        let description = orchestrator.compose_team_description();
        assert!(description.contains("coordinator: routes tasks"));
        assert!(description.contains("researcher: looks things up"));
    }
}
