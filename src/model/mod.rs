//! The model client boundary: the one seam every LLM call in the crate goes
//! through, so the ReAct loop, the playbook generator, the tool memory
//! manager, and the parser's repair stage all share one trait object instead
//! of each hand-rolling a provider client. Shipping real provider HTTP
//! clients is out of scope here; only the trait and a deterministic
//! [`stub::StubModelClient`] live in this crate.

pub mod stub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A chat message in the conversation sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Token accounting returned alongside a completion, mirroring the
/// `usage` block every OpenAI-shaped provider response carries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Anything that can turn a message history into a completion.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// `model_name` overrides the client's default model for this call, or
    /// `None` to use whatever the client was configured with — this is how
    /// a role's `model_name` override reaches the call.
    async fn complete(
        &self,
        messages: &[Message],
        model_name: Option<&str>,
    ) -> Result<(String, Usage), ModelError>;
}
