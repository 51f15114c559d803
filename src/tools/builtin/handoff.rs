//! The `handoff` tool: dispatches a task to another role's shared queue and
//! returns immediately. Unlike a normal tool call, its name is special-cased
//! by [`crate::agent::core`]: once `invoke` has published the task event,
//! the agent's ReAct loop exits with no answer (`Ok(None)`) instead of
//! continuing to iterate. The receiving role's agent answers on its own
//! time; the result comes back as a later, independent event delivered to
//! the sender's *role* (see [`crate::messaging::handoff_protocol`] and
//! [`crate::agent::listener`]), not by blocking this call.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::kvs::Kvs;
use crate::messaging::{self, handoff_protocol};
use crate::tools::{render_full_description, ParamSpec, Tool, ToolDescriptor};

pub struct HandoffTool {
    descriptor: ToolDescriptor,
    kvs: Arc<dyn Kvs>,
    chat_id: String,
    sender_id: String,
    sender_role: String,
}

impl HandoffTool {
    pub fn new(
        kvs: Arc<dyn Kvs>,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_role: impl Into<String>,
    ) -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(
            "target_role".to_string(),
            ParamSpec {
                type_name: "string".to_string(),
                description: "the role to hand the task to".to_string(),
                required: true,
            },
        );
        parameters.insert(
            "task".to_string(),
            ParamSpec {
                type_name: "string".to_string(),
                description: "a short instruction naming what the receiving role should do"
                    .to_string(),
                required: true,
            },
        );
        parameters.insert(
            "description".to_string(),
            ParamSpec {
                type_name: "string".to_string(),
                description: "additional context explaining why this task is needed".to_string(),
                required: false,
            },
        );
        parameters.insert(
            "context".to_string(),
            ParamSpec {
                type_name: "object".to_string(),
                description: "optional free-form data to carry alongside the task".to_string(),
                required: false,
            },
        );
        let description = "Hands a task off to another role. Does not wait for a reply — \
            the result arrives later as a fresh run of your own loop."
            .to_string();
        let mut output_schema = HashMap::new();
        output_schema.insert("status".to_string(), "always \"dispatched\" on success".to_string());
        output_schema.insert("event_id".to_string(), "id of the published task event".to_string());
        output_schema.insert("target_role".to_string(), "the role the task was sent to".to_string());
        let full_description = render_full_description(&description, &parameters, &output_schema);
        HandoffTool {
            descriptor: ToolDescriptor {
                name: "handoff".to_string(),
                description,
                full_description,
                parameters,
                output_schema,
                is_async: true,
                max_retries: 1,
                retry_delay_secs: 1.0,
            },
            kvs,
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_role: sender_role.into(),
        }
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let target_role = args
            .get("target_role")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool: "handoff".to_string(),
                attempts: 1,
                message: "missing required field `target_role`".to_string(),
            })?;
        let task = args
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool: "handoff".to_string(),
                attempts: 1,
                message: "missing required field `task`".to_string(),
            })?;
        let description = args.get("description").and_then(|v| v.as_str()).unwrap_or("");
        let context = args.get("context").cloned();

        let event = handoff_protocol::build_task_event(
            &self.chat_id,
            target_role,
            &self.sender_id,
            &self.sender_role,
            task,
            description,
            context,
        );
        let event_id = event.event_id.clone();

        messaging::publish_to_role(self.kvs.as_ref(), &event)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "handoff".to_string(),
                attempts: 1,
                message: e.to_string(),
            })?;

        Ok(serde_json::json!({
            "status": "dispatched",
            "event_id": event_id,
            "target_role": target_role,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::memory_kvs::InMemoryKvs;
    use crate::kvs::role_queue_key;

    #[tokio::test]
    async fn dispatches_task_to_the_target_roles_shared_queue() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let tool = HandoffTool::new(kvs.clone(), "chat-1", "agent-c", "coordinator");
        let result = tool
            .invoke(serde_json::json!({
                "target_role": "researcher",
                "task": "find X",
                "description": "needed for the final report",
            }))
            .await
            .unwrap();
        assert_eq!(result["status"], "dispatched");

        let pending = kvs.lrange(&role_queue_key("researcher"), 0, -1).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn missing_task_field_fails_without_publishing() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let tool = HandoffTool::new(kvs.clone(), "chat-1", "agent-c", "coordinator");
        let err = tool
            .invoke(serde_json::json!({ "target_role": "researcher" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        let pending = kvs.lrange(&role_queue_key("researcher"), 0, -1).await.unwrap();
        assert!(pending.is_empty());
    }
}
