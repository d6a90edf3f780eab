pub mod openai;

use async_trait::async_trait;

use crate::error::ChatbotError;

/// Messages exchanged between the handler and LLM providers.
/// Enum, since the roles are known at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Role name as it appears on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content } => content,
        }
    }
}

/// Extension point for LLM inference backends. The only `dyn Trait`
/// boundary in the crate.
///
/// `complete` returns the first choice's text, or `None` when the provider
/// answered without any.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, messages: &[Message]) -> Result<Option<String>, ChatbotError>;
}
