//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check, tool listing and task progress
//! - `chat` - Text and voice conversation WebSocket

pub mod api;
pub mod chat;

pub use chat::chat_handler;
