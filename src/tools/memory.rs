//! Per-(user, tool) usage guidance, learned asynchronously from completed
//! invocations.
//!
//! Grounded on `proteus/src/manager/tool_memory_manager.py`: after a tool
//! call completes, a background analysis pass asks the model "what did you
//! learn about calling this tool that would help next time?" and overwrites
//! (not appends) a short guidance string, stored under
//! `tool_memory:<user>:<tool>` with a global `tool_memory:<tool>` fallback
//! for users with no history yet.

use serde_json::Value;
use std::sync::Arc;

use crate::kvs::Kvs;
use crate::model::{Message, ModelClient};
use crate::utilities::errors::KvsError;

fn user_key(user: &str, tool: &str) -> String {
    format!("tool_memory:{user}:{tool}")
}

fn global_key(tool: &str) -> String {
    format!("tool_memory:{tool}")
}

pub struct ToolMemoryManager {
    kvs: Arc<dyn Kvs>,
    model: Arc<dyn ModelClient>,
}

impl ToolMemoryManager {
    pub fn new(kvs: Arc<dyn Kvs>, model: Arc<dyn ModelClient>) -> Self {
        ToolMemoryManager { kvs, model }
    }

    /// Returns the best guidance available for `(user, tool)`: the
    /// user-scoped memory if present, else the tool's global memory, else
    /// `None`.
    pub async fn load(&self, user: &str, tool: &str) -> Result<Option<String>, KvsError> {
        if let Some(guidance) = self.kvs.get(&user_key(user, tool)).await? {
            return Ok(Some(guidance));
        }
        self.kvs.get(&global_key(tool)).await
    }

    /// Analyzes one completed tool call and overwrites its stored guidance.
    /// Called fire-and-forget by the agent loop after each tool invocation
    /// so it never blocks the ReAct step waiting on this extra model call.
    pub async fn record(
        &self,
        user: &str,
        tool: &str,
        args: &Value,
        result: &Result<Value, String>,
    ) {
        let outcome = match result {
            Ok(value) => format!("succeeded with result: {value}"),
            Err(message) => format!("failed with error: {message}"),
        };
        let prompt = format!(
            "You just called the tool `{tool}` with arguments {args}. It {outcome}. \
             In one or two sentences, write guidance for future calls to this tool \
             that would help avoid mistakes or use it more effectively. Respond with \
             plain text only, no preamble."
        );
        let messages = vec![Message::user(prompt)];
        let guidance = match self.model.complete(&messages, None).await {
            Ok((text, _usage)) => text,
            Err(err) => {
                tracing::warn!(error = %err, tool, "tool memory analysis call failed");
                return;
            }
        };

        if let Err(err) = self.kvs.set(&user_key(user, tool), guidance.clone()).await {
            tracing::warn!(error = %err, tool, "failed to persist user-scoped tool memory");
        }
        if let Err(err) = self.kvs.set(&global_key(tool), guidance).await {
            tracing::warn!(error = %err, tool, "failed to persist global tool memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::memory_kvs::InMemoryKvs;
    use crate::model::stub::StubModelClient;

    #[tokio::test]
    async fn load_prefers_user_scoped_over_global() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        kvs.set("tool_memory:search", "global guidance".to_string())
            .await
            .unwrap();
        kvs.set("tool_memory:alice:search", "user guidance".to_string())
            .await
            .unwrap();
        let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(Vec::<String>::new()));
        let manager = ToolMemoryManager::new(kvs, model);
        assert_eq!(
            manager.load("alice", "search").await.unwrap(),
            Some("user guidance".to_string())
        );
        assert_eq!(
            manager.load("bob", "search").await.unwrap(),
            Some("global guidance".to_string())
        );
    }

    #[tokio::test]
    async fn record_overwrites_both_keys() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let model: Arc<dyn ModelClient> =
            Arc::new(StubModelClient::new(vec!["pass a bare string next time".to_string()]));
        let manager = ToolMemoryManager::new(kvs.clone(), model);
        manager
            .record(
                "alice",
                "search",
                &serde_json::json!({"query": "rust"}),
                &Ok(serde_json::json!({"hits": 3})),
            )
            .await;
        assert_eq!(
            manager.load("alice", "search").await.unwrap(),
            Some("pass a bare string next time".to_string())
        );
    }
}
