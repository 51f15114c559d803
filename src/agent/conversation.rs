//! Conversation turn persistence: the user/assistant dialogue for a chat,
//! separate from any one agent's scratchpad (several agents in a team share
//! the same conversation log).
//!
//! Same bounded-list + TTL persistence pattern as
//! [`crate::agent::scratchpad`], keyed by `conversation:<chat_id>`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::kvs::Kvs;
use crate::utilities::errors::KvsError;

const CONVERSATION_CAP: isize = 100;
const CONVERSATION_TTL_SECS: i64 = 12 * 3600;

fn conversation_key(chat_id: &str) -> String {
    format!("conversation:{chat_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
    pub agent_id: Option<String>,
}

pub struct ConversationStore {
    kvs: Arc<dyn Kvs>,
}

impl ConversationStore {
    pub fn new(kvs: Arc<dyn Kvs>) -> Self {
        ConversationStore { kvs }
    }

    pub async fn append(&self, chat_id: &str, turn: &ConversationTurn) -> Result<(), KvsError> {
        let key = conversation_key(chat_id);
        let serialized = serde_json::to_string(turn).map_err(|e| KvsError::Operation {
            message: format!("failed to serialize conversation turn: {e}"),
        })?;
        self.kvs.rpush(&key, serialized).await?;
        self.kvs.ltrim(&key, -CONVERSATION_CAP, -1).await?;
        self.kvs.expire(&key, CONVERSATION_TTL_SECS).await
    }

    pub async fn load(&self, chat_id: &str) -> Result<Vec<ConversationTurn>, KvsError> {
        let key = conversation_key(chat_id);
        let raw = self.kvs.lrange(&key, 0, -1).await?;
        raw.into_iter()
            .map(|entry| {
                serde_json::from_str(&entry).map_err(|e| KvsError::Deserialize {
                    key: key.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::memory_kvs::InMemoryKvs;

    #[tokio::test]
    async fn append_and_load_round_trip() {
        let store = ConversationStore::new(Arc::new(InMemoryKvs::new()));
        let turn = ConversationTurn {
            role: "user".to_string(),
            content: "what's the weather".to_string(),
            agent_id: None,
        };
        store.append("chat-1", &turn).await.unwrap();
        let loaded = store.load("chat-1").await.unwrap();
        assert_eq!(loaded, vec![turn]);
    }
}
