//! A deterministic, scripted [`ModelClient`] for tests: pops pre-recorded
//! completions off a queue instead of calling out to a provider.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{Message, ModelClient, Usage};
use crate::error::ModelError;

pub struct StubModelClient {
    responses: Mutex<std::collections::VecDeque<String>>,
}

impl StubModelClient {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        StubModelClient {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ModelClient for StubModelClient {
    async fn complete(
        &self,
        _messages: &[Message],
        _model_name: Option<&str>,
    ) -> Result<(String, Usage), ModelError> {
        let mut responses = self.responses.lock().unwrap();
        let completion = responses
            .pop_front()
            .ok_or_else(|| ModelError::Transport("stub model exhausted".to_string()))?;
        let usage = Usage {
            prompt_tokens: 0,
            completion_tokens: completion.split_whitespace().count() as u32,
            total_tokens: completion.split_whitespace().count() as u32,
        };
        Ok((completion, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_responses_in_order() {
        let client = StubModelClient::new(vec!["first".to_string(), "second".to_string()]);
        let (completion, _) = client.complete(&[], None).await.unwrap();
        assert_eq!(completion, "first");
        let (completion, _) = client.complete(&[], None).await.unwrap();
        assert_eq!(completion, "second");
    }

    #[tokio::test]
    async fn errors_when_exhausted() {
        let client = StubModelClient::new(Vec::<String>::new());
        assert!(client.complete(&[], None).await.is_err());
    }
}
