//! Chat WebSocket handlers
//!
//! One connection per client on `GET /chat?userId=<id>`. Every frame is a
//! JSON envelope discriminated by `type`.
//!
//! ## Client → Server
//!
//! - **chat.completions**: typed message `{userId, itemId, content, timestamp}`
//! - **chat.voice**: audio chunk `{userId, itemId, audioType, base64Data, seq?, timestamp}`;
//!   `audioType: "done"` ends the utterance
//!
//! ## Server → Client
//!
//! - **chat.completions**: assistant reply, recognized user speech and
//!   progress notices `{userId, itemId, role, content, timestamp}`
//! - **chat.voice**: base64 synthesized audio with a `done` flag on the last chunk

mod handler;
pub mod messages;

pub use handler::chat_handler;
