use async_trait::async_trait;
use thiserror::Error;

use super::types::{ChatCompletionsRequest, ChatCompletionsResponse};

/// Errors raised while talking to the model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Insecure LLM endpoint rejected: {0}")]
    InsecureEndpoint(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("LLM backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode LLM response: {0}")]
    Decode(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// A chat-completions backend.
///
/// The production variant is [`super::HttpsChatBackend`]; tests plug in
/// scripted implementations.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one completion request and return the decoded response.
    async fn complete(
        &self,
        request: &ChatCompletionsRequest,
    ) -> LlmResult<ChatCompletionsResponse>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

pub type BoxedChatBackend = std::sync::Arc<dyn ChatBackend>;
