//! Model backend: chat-completions types, the backend capability trait and
//! the HTTPS production client.

mod base;
mod client;
pub mod provider;
pub mod types;

pub use base::{BoxedChatBackend, ChatBackend, LlmError, LlmResult};
pub use client::HttpsChatBackend;
pub use provider::LlmProvider;
pub use types::{
    ChatChoice, ChatCompletionsRequest, ChatCompletionsResponse, ChatTurn, FunctionCall,
    FunctionDefinition, Role, TokenUsage, ToolCall, ToolDefinition,
};
