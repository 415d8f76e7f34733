//! Conversation session: history, model round-trips, tool dispatch and the
//! per-item speech pipelines.

mod history;
pub mod messages;
#[allow(clippy::module_inception)]
mod session;

pub use history::{ChatHistory, DEFAULT_HISTORY_CAP};
pub use messages::{ASSISTANT_USER_ID, OutboundKind, OutboundMessage, VoiceChunk};
pub use session::{
    ConversationSession, DEFAULT_PROMPT_SUFFIX, DEFAULT_SYNTHESIS_TEARDOWN,
    DEFAULT_VOICE_QUEUE_CAPACITY, SessionConfig, SessionError, SessionResult,
};
