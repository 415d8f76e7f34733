//! Envelopes produced and consumed by the conversation session.

use serde::{Deserialize, Serialize};

use crate::core::llm::Role;
use crate::utils::now_ms;

/// User id stamped on every assistant-originated message.
pub const ASSISTANT_USER_ID: &str = "ai";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundKind {
    #[serde(rename = "chat.completions")]
    ChatCompletions,
    #[serde(rename = "chat.voice")]
    ChatVoice,
}

/// Message written to the attached duplex stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    pub user_id: String,
    pub item_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl OutboundMessage {
    /// Assistant chat reply.
    pub fn assistant_text(item_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::ChatCompletions,
            user_id: ASSISTANT_USER_ID.to_string(),
            item_id: item_id.into(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_ms(),
            done: None,
        }
    }

    /// Echo of recognized user speech.
    pub fn user_text(
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: OutboundKind::ChatCompletions,
            user_id: user_id.into(),
            item_id: item_id.into(),
            role: Role::User,
            content: content.into(),
            timestamp: now_ms(),
            done: None,
        }
    }

    /// Base64 audio chunk of a synthesized reply.
    pub fn assistant_voice(item_id: impl Into<String>, base64_audio: String, done: bool) -> Self {
        Self {
            kind: OutboundKind::ChatVoice,
            user_id: ASSISTANT_USER_ID.to_string(),
            item_id: item_id.into(),
            role: Role::Assistant,
            content: base64_audio,
            timestamp: now_ms(),
            done: Some(done),
        }
    }
}

/// One inbound audio chunk queued for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceChunk {
    pub user_id: String,
    pub item_id: String,
    /// `"done"` marks the last chunk of an utterance
    pub audio_type: String,
    pub base64_data: String,
    pub seq: Option<u64>,
}

impl VoiceChunk {
    pub fn is_last(&self) -> bool {
        self.audio_type == "done"
    }
}
