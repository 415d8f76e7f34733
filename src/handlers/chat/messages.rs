//! Inbound chat envelopes

use serde::Deserialize;

use crate::core::session::VoiceChunk;

/// Incoming WebSocket messages from the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ChatIncomingMessage {
    /// Typed user message
    #[serde(rename = "chat.completions")]
    Text(TextMessage),

    /// One chunk of user speech
    #[serde(rename = "chat.voice")]
    Voice(VoiceMessage),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessage {
    #[serde(default)]
    pub user_id: String,
    pub item_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMessage {
    #[serde(default)]
    pub user_id: String,
    pub item_id: String,
    #[serde(default)]
    pub audio_type: String,
    #[serde(default)]
    pub base64_data: String,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl From<VoiceMessage> for VoiceChunk {
    fn from(msg: VoiceMessage) -> Self {
        VoiceChunk {
            user_id: msg.user_id,
            item_id: msg.item_id,
            audio_type: msg.audio_type,
            base64_data: msg.base64_data,
            seq: msg.seq,
        }
    }
}

impl ChatIncomingMessage {
    /// Fill a missing `userId` with the connection's user.
    pub fn with_default_user(mut self, user_id: &str) -> Self {
        let slot = match &mut self {
            ChatIncomingMessage::Text(msg) => &mut msg.user_id,
            ChatIncomingMessage::Voice(msg) => &mut msg.user_id,
        };
        if slot.is_empty() {
            *slot = user_id.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_envelope() {
        let json = r#"{"type":"chat.completions","userId":"u1","itemId":"i1","role":"user","content":"hello","timestamp":1700000000000}"#;
        let msg: ChatIncomingMessage = serde_json::from_str(json).unwrap();
        match msg {
            ChatIncomingMessage::Text(text) => {
                assert_eq!(text.user_id, "u1");
                assert_eq!(text.item_id, "i1");
                assert_eq!(text.content, "hello");
                assert_eq!(text.timestamp, Some(1_700_000_000_000));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_voice_envelope() {
        let json = r#"{"type":"chat.voice","userId":"u1","itemId":"i1","audioType":"done","base64Data":"AAA=","seq":3}"#;
        let msg: ChatIncomingMessage = serde_json::from_str(json).unwrap();
        let ChatIncomingMessage::Voice(voice) = msg else {
            panic!("expected voice message");
        };
        let chunk = VoiceChunk::from(voice);
        assert!(chunk.is_last());
        assert_eq!(chunk.seq, Some(3));
        assert_eq!(chunk.base64_data, "AAA=");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"type":"chat.unknown","itemId":"i1"}"#;
        assert!(serde_json::from_str::<ChatIncomingMessage>(json).is_err());
    }

    #[test]
    fn test_default_user_fills_only_missing() {
        let json = r#"{"type":"chat.completions","itemId":"i1","content":"hi"}"#;
        let msg: ChatIncomingMessage = serde_json::from_str(json).unwrap();
        let ChatIncomingMessage::Text(text) = msg.with_default_user("conn-user") else {
            panic!("expected text message");
        };
        assert_eq!(text.user_id, "conn-user");

        let json = r#"{"type":"chat.completions","userId":"u9","itemId":"i1","content":"hi"}"#;
        let msg: ChatIncomingMessage = serde_json::from_str(json).unwrap();
        let ChatIncomingMessage::Text(text) = msg.with_default_user("conn-user") else {
            panic!("expected text message");
        };
        assert_eq!(text.user_id, "u9");
    }
}
