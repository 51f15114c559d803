//! The playbook generator: a rolling, model-written plan string regenerated
//! every ReAct iteration from the previous playbook and the latest
//! scratchpad step, so an agent's prompt always carries an up-to-date
//! summary of "what's the plan now" instead of a full transcript. Persisted
//! under `playbook:<chat_id>` the same way scratchpad and conversation state
//! are.

use std::sync::Arc;

use crate::kvs::Kvs;
use crate::model::{Message, ModelClient};
use crate::utilities::errors::KvsError;

const PLAYBOOK_TTL_SECS: i64 = 12 * 3600;

fn playbook_key(chat_id: &str) -> String {
    format!("playbook:{chat_id}")
}

pub struct PlaybookGenerator {
    kvs: Arc<dyn Kvs>,
    model: Arc<dyn ModelClient>,
}

impl PlaybookGenerator {
    pub fn new(kvs: Arc<dyn Kvs>, model: Arc<dyn ModelClient>) -> Self {
        PlaybookGenerator { kvs, model }
    }

    pub async fn load(&self, chat_id: &str) -> Result<Option<String>, KvsError> {
        self.kvs.get(&playbook_key(chat_id)).await
    }

    /// Regenerates the playbook from `last_playbook` (`None` on the first
    /// iteration) and `latest_step` — typically a short rendering of the
    /// most recent thought/action/observation — and persists the result.
    pub async fn regenerate(
        &self,
        chat_id: &str,
        last_playbook: Option<&str>,
        latest_step: &str,
    ) -> Result<String, KvsError> {
        let prompt = format!(
            "Current plan:\n{}\n\nLatest step taken:\n{latest_step}\n\n\
             Rewrite the plan to reflect progress so far. Keep it short — a \
             few bullet points of what's done and what's next. Respond with \
             plain text only.",
            last_playbook.unwrap_or("(no plan yet)"),
        );
        let messages = vec![Message::user(prompt)];
        let playbook = match self.model.complete(&messages, None).await {
            Ok((text, _usage)) => text,
            Err(err) => {
                tracing::warn!(error = %err, chat_id, "playbook regeneration failed, keeping previous plan");
                return Ok(last_playbook.unwrap_or_default().to_string());
            }
        };

        self.kvs
            .set_ex(&playbook_key(chat_id), playbook.clone(), PLAYBOOK_TTL_SECS)
            .await?;
        Ok(playbook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::memory_kvs::InMemoryKvs;
    use crate::model::stub::StubModelClient;

    #[tokio::test]
    async fn regenerate_persists_and_returns_new_playbook() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let model: Arc<dyn ModelClient> =
            Arc::new(StubModelClient::new(vec!["1. done searching\n2. write answer".to_string()]));
        let generator = PlaybookGenerator::new(kvs.clone(), model);
        let playbook = generator
            .regenerate("chat-1", None, "searched for rust async runtimes")
            .await
            .unwrap();
        assert_eq!(playbook, "1. done searching\n2. write answer");
        assert_eq!(generator.load("chat-1").await.unwrap(), Some(playbook));
    }

    #[tokio::test]
    async fn regenerate_falls_back_to_previous_plan_on_model_error() {
        let kvs: Arc<dyn Kvs> = Arc::new(InMemoryKvs::new());
        let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(Vec::<String>::new()));
        let generator = PlaybookGenerator::new(kvs, model);
        let playbook = generator
            .regenerate("chat-1", Some("old plan"), "did something")
            .await
            .unwrap();
        assert_eq!(playbook, "old plan");
    }
}
