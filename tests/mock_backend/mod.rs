//! Scripted model backend and session builders shared by the integration tests.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use voice_agent_gateway::ServerConfig;
use voice_agent_gateway::core::llm::{
    ChatBackend, ChatChoice, ChatCompletionsRequest, ChatCompletionsResponse, ChatTurn,
    LlmError, LlmResult, ToolCall,
};
use voice_agent_gateway::core::media::MediaToolkit;
use voice_agent_gateway::core::progress::ProgressTracker;
use voice_agent_gateway::core::session::{ConversationSession, OutboundMessage, SessionConfig};
use voice_agent_gateway::core::speech::SpeechFactory;
use voice_agent_gateway::core::tools::{ToolDispatcher, builtin_registry};

/// Backend answering from a queue of canned replies and recording requests.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<LlmResult<ChatCompletionsResponse>>>,
    requests: Mutex<Vec<ChatCompletionsRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_text(&self, text: &str) {
        self.replies.lock().push_back(Ok(text_response(text)));
    }

    pub fn push_tool_call(&self, call_id: &str, name: &str, arguments: Value) {
        self.replies
            .lock()
            .push_back(Ok(tool_call_response(call_id, name, arguments)));
    }

    pub fn push_empty(&self) {
        self.replies
            .lock()
            .push_back(Ok(ChatCompletionsResponse::default()));
    }

    pub fn push_error(&self) {
        self.replies.lock().push_back(Err(LlmError::Status {
            status: 500,
            body: "scripted failure".to_string(),
        }));
    }

    pub fn requests(&self) -> Vec<ChatCompletionsRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: &ChatCompletionsRequest,
    ) -> LlmResult<ChatCompletionsResponse> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn text_response(text: &str) -> ChatCompletionsResponse {
    ChatCompletionsResponse {
        choices: vec![ChatChoice {
            index: 0,
            message: ChatTurn::assistant(text),
            finish_reason: Some("stop".to_string()),
        }],
        ..Default::default()
    }
}

pub fn tool_call_response(call_id: &str, name: &str, arguments: Value) -> ChatCompletionsResponse {
    let mut turn = ChatTurn::assistant("");
    turn.tool_calls = vec![ToolCall::new(call_id, name, arguments)];
    ChatCompletionsResponse {
        choices: vec![ChatChoice {
            index: 0,
            message: turn,
            finish_reason: Some("tool_calls".to_string()),
        }],
        ..Default::default()
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        model: "test-model".to_string(),
        ..Default::default()
    }
}

/// Session over the built-in tools with the given backend and speech factory.
pub fn build_session(
    config: SessionConfig,
    backend: Arc<ScriptedBackend>,
    speech: Arc<dyn SpeechFactory>,
) -> (Arc<ConversationSession>, Arc<ProgressTracker>) {
    let tracker = Arc::new(ProgressTracker::new());
    let registry = Arc::new(builtin_registry(Arc::new(MediaToolkit::default())));
    let session = ConversationSession::new(
        config,
        backend,
        ToolDispatcher::new(registry),
        tracker.clone(),
        speech,
    );
    (session, tracker)
}

/// Minimal valid configuration for router tests.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.llm_api_key = "test-key".to_string();
    config
}

/// Attach a fresh outbound channel to `session`.
pub fn attach(session: &ConversationSession, capacity: usize) -> mpsc::Receiver<OutboundMessage> {
    let (tx, rx) = mpsc::channel(capacity);
    session.attach_outbound(tx);
    rx
}

/// Receive the next outbound message or fail after a second.
pub async fn next_message(rx: &mut mpsc::Receiver<OutboundMessage>) -> OutboundMessage {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("outbound channel closed")
}

/// Poll `condition` until it holds or a second passes.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
