use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::history::{ChatHistory, DEFAULT_HISTORY_CAP};
use super::messages::{OutboundMessage, VoiceChunk};
use crate::core::llm::{
    BoxedChatBackend, ChatCompletionsRequest, ChatCompletionsResponse, ChatTurn, LlmError,
};
use crate::core::progress::ProgressHandle;
use crate::core::speech::{
    BoxedRecognizer, BoxedSynthesizer, RecognitionCallback, RecognitionEvent, SpeechError,
    SpeechFactory, SynthesisCallback, SynthesisEvent,
};
use crate::core::tools::ToolDispatcher;
use crate::utils::{markdown_to_text, spawn_guarded};

pub const DEFAULT_PROMPT_SUFFIX: &str =
    "\nPlease keep the answer short and reply in plain text without markdown.";
pub const DEFAULT_VOICE_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_SYNTHESIS_TEARDOWN: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Model backend error: {0}")]
    Backend(#[from] LlmError),
    #[error("Model returned no usable reply")]
    EmptyReply,
    #[error("Voice queue is full")]
    QueueFull,
    #[error("Speech pipeline error: {0}")]
    Pipeline(#[from] SpeechError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Tunables for a [`ConversationSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model id sent with every request
    pub model: String,
    pub history_cap: usize,
    pub voice_queue_capacity: usize,
    /// Grace period before a finished synthesizer is stopped and removed
    pub synthesis_teardown: Duration,
    /// Appended to every user prompt
    pub prompt_suffix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            history_cap: DEFAULT_HISTORY_CAP,
            voice_queue_capacity: DEFAULT_VOICE_QUEUE_CAPACITY,
            synthesis_teardown: DEFAULT_SYNTHESIS_TEARDOWN,
            prompt_suffix: DEFAULT_PROMPT_SUFFIX.to_string(),
        }
    }
}

struct RecognitionHandle {
    recognizer: BoxedRecognizer,
    /// Assigned by the service on start
    voice_id: Option<String>,
}

#[derive(Default)]
struct Pipelines {
    recognizers: HashMap<String, RecognitionHandle>,
    synthesizers: HashMap<String, BoxedSynthesizer>,
}

struct OutboundAttachment {
    id: u64,
    tx: mpsc::Sender<OutboundMessage>,
}

/// Process-wide conversation state.
///
/// Owns the bounded chat history, drives the model and tool round-trips,
/// and runs the per-item speech pipelines. Replies go to whichever outbound
/// stream was attached most recently.
pub struct ConversationSession {
    config: SessionConfig,
    backend: BoxedChatBackend,
    dispatcher: ToolDispatcher,
    progress: ProgressHandle,
    speech: Arc<dyn SpeechFactory>,

    history: Mutex<ChatHistory>,
    pipelines: Mutex<Pipelines>,

    outbound: Mutex<Option<OutboundAttachment>>,
    next_attachment_id: AtomicU64,
    /// Last user id seen on an inbound message
    user_id: Mutex<String>,

    voice_tx: mpsc::Sender<VoiceChunk>,
    voice_rx: Mutex<Option<mpsc::Receiver<VoiceChunk>>>,
}

impl ConversationSession {
    pub fn new(
        config: SessionConfig,
        backend: BoxedChatBackend,
        dispatcher: ToolDispatcher,
        progress: ProgressHandle,
        speech: Arc<dyn SpeechFactory>,
    ) -> Arc<Self> {
        let (voice_tx, voice_rx) = mpsc::channel(config.voice_queue_capacity.max(1));
        Arc::new(Self {
            history: Mutex::new(ChatHistory::new(config.history_cap)),
            config,
            backend,
            dispatcher,
            progress,
            speech,
            pipelines: Mutex::new(Pipelines::default()),
            outbound: Mutex::new(None),
            next_attachment_id: AtomicU64::new(1),
            user_id: Mutex::new(String::new()),
            voice_tx,
            voice_rx: Mutex::new(Some(voice_rx)),
        })
    }

    /// Spawn the voice queue consumer. Returns `None` if already started.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.voice_rx.lock().take()?;
        let weak: Weak<Self> = Arc::downgrade(self);

        Some(spawn_guarded("voice-consumer", async move {
            while let Some(chunk) = rx.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                let item_id = chunk.item_id.clone();
                if AssertUnwindSafe(session.process_voice_chunk(chunk))
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    error!(item_id = %item_id, "Voice chunk processing panicked");
                }
            }
            debug!("Voice consumer stopped");
        }))
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn history_snapshot(&self) -> Vec<ChatTurn> {
        self.history.lock().snapshot()
    }

    /// Drop every buffered turn.
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn has_recognizer(&self, item_id: &str) -> bool {
        self.pipelines.lock().recognizers.contains_key(item_id)
    }

    pub fn has_synthesizer(&self, item_id: &str) -> bool {
        self.pipelines.lock().synthesizers.contains_key(item_id)
    }

    fn remember_user(&self, user_id: &str) {
        if !user_id.is_empty() {
            *self.user_id.lock() = user_id.to_string();
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Route future outbound messages to `tx`, replacing any earlier stream.
    pub fn attach_outbound(&self, tx: mpsc::Sender<OutboundMessage>) -> u64 {
        let id = self.next_attachment_id.fetch_add(1, Ordering::Relaxed);
        *self.outbound.lock() = Some(OutboundAttachment { id, tx });
        debug!(attachment = id, "Outbound stream attached");
        id
    }

    /// Detach only if `id` is still the current attachment.
    pub fn detach_outbound(&self, id: u64) -> bool {
        let mut outbound = self.outbound.lock();
        if outbound.as_ref().is_some_and(|a| a.id == id) {
            *outbound = None;
            debug!(attachment = id, "Outbound stream detached");
            return true;
        }
        false
    }

    /// Queue a message on the attached stream without waiting.
    pub fn publish(&self, message: OutboundMessage) -> bool {
        let tx = self.outbound.lock().as_ref().map(|a| a.tx.clone());
        let Some(tx) = tx else {
            debug!(item_id = %message.item_id, "No outbound stream attached, dropping message");
            return false;
        };
        match tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(item_id = %message.item_id, "Outbound queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                warn!(item_id = %message.item_id, "Outbound stream closed, dropping message");
                false
            }
        }
    }

    /// Markdown-stripped assistant reply for `item_id`.
    pub fn publish_assistant(&self, item_id: &str, text: &str) -> bool {
        self.publish(OutboundMessage::assistant_text(item_id, markdown_to_text(text)))
    }

    // =========================================================================
    // Model round-trips
    // =========================================================================

    fn request(&self, messages: Vec<ChatTurn>, with_tools: bool) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages,
            tools: if with_tools {
                self.dispatcher.definitions()
            } else {
                Vec::new()
            },
        }
    }

    /// Append the prompt as a user turn and ask the model for a reply.
    ///
    /// Every assistant choice is appended to the history.
    pub async fn chat_completions(
        &self,
        prompt: &str,
        with_tools: bool,
    ) -> SessionResult<ChatCompletionsResponse> {
        let request = {
            let mut history = self.history.lock();
            history.push(ChatTurn::user(format!(
                "{prompt}{}",
                self.config.prompt_suffix
            )));
            self.request(history.snapshot(), with_tools)
        };

        debug!(
            backend = self.backend.name(),
            turns = request.messages.len(),
            "Requesting chat completion"
        );
        let response = self.backend.complete(&request).await?;
        if response.choices.is_empty() {
            return Err(SessionError::EmptyReply);
        }

        let mut history = self.history.lock();
        for turn in response.assistant_turns() {
            history.push(turn.clone());
        }
        Ok(response)
    }

    /// Send a tool result back to the model; the history is cleared afterwards.
    pub async fn tool_result_completions(
        &self,
        result: &str,
        call_id: &str,
    ) -> SessionResult<ChatCompletionsResponse> {
        let request = {
            let mut history = self.history.lock();
            history.push(ChatTurn::tool_result(call_id, result));
            self.request(history.snapshot(), true)
        };

        let response = self.backend.complete(&request).await;
        self.history.lock().clear();

        let response = response?;
        if response.choices.is_empty() {
            return Err(SessionError::EmptyReply);
        }
        Ok(response)
    }

    /// Run one full exchange and return the reply text.
    pub async fn submit(&self, prompt: &str) -> SessionResult<String> {
        let response = self.chat_completions(prompt, true).await?;

        let Some(turn) = response.assistant_turns().find(|t| t.has_tool_calls()) else {
            return response
                .first_assistant_text()
                .map(str::to_string)
                .ok_or(SessionError::EmptyReply);
        };

        let call_id = turn
            .tool_call_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| turn.tool_calls.first().map(|c| c.id.clone()))
            .unwrap_or_default();

        let result = match self
            .dispatcher
            .dispatch(&turn.tool_calls, self.progress.clone())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(call_id = %call_id, "Tool dispatch failed: {}", e);
                e.to_string()
            }
        };
        debug!(call_id = %call_id, "Tool result: {}", result);

        let second = self.tool_result_completions(&result, &call_id).await?;
        second
            .first_assistant_text()
            .map(str::to_string)
            .ok_or(SessionError::EmptyReply)
    }

    // =========================================================================
    // Text path
    // =========================================================================

    /// Answer a text message; with `voice_reply` the answer is also spoken.
    pub async fn handle_text(
        self: &Arc<Self>,
        user_id: &str,
        item_id: &str,
        content: &str,
        voice_reply: bool,
    ) {
        self.remember_user(user_id);
        info!(user_id = %user_id, item_id = %item_id, "Handling chat message");

        let reply = match self.submit(content).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(item_id = %item_id, "No reply produced: {}", e);
                return;
            }
        };

        let text = markdown_to_text(&reply);
        self.publish(OutboundMessage::assistant_text(item_id, text.as_str()));

        if voice_reply {
            self.speak(item_id, &text).await;
        }
    }

    // =========================================================================
    // Synthesis
    // =========================================================================

    async fn speak(self: &Arc<Self>, item_id: &str, text: &str) {
        let synthesizer = match self.synthesizer_for(item_id).await {
            Ok(s) => s,
            Err(e) => {
                error!(item_id = %item_id, "Failed to start synthesis: {}", e);
                return;
            }
        };
        if let Err(e) = synthesizer.write(text).await {
            warn!(item_id = %item_id, "Synthesis write failed: {}", e);
        }
    }

    async fn synthesizer_for(self: &Arc<Self>, item_id: &str) -> SessionResult<BoxedSynthesizer> {
        let existing = self.pipelines.lock().synthesizers.get(item_id).cloned();
        if let Some(synthesizer) = existing {
            return Ok(synthesizer);
        }

        let weak = Arc::downgrade(self);
        let item = item_id.to_string();
        let callback: SynthesisCallback = Arc::new(move |event| {
            let weak = weak.clone();
            let item = item.clone();
            Box::pin(async move {
                if let Some(session) = weak.upgrade() {
                    session.on_synthesis_event(&item, event);
                }
            })
        });

        let synthesizer = self.speech.synthesizer(item_id, callback)?;
        synthesizer.start().await?;
        let synthesizer = self
            .pipelines
            .lock()
            .synthesizers
            .entry(item_id.to_string())
            .or_insert(synthesizer)
            .clone();
        Ok(synthesizer)
    }

    /// Forward synthesized audio and tear the pipeline down when it ends.
    pub fn on_synthesis_event(self: &Arc<Self>, item_id: &str, event: SynthesisEvent) {
        match event {
            SynthesisEvent::AudioChunk(audio) => {
                self.publish(OutboundMessage::assistant_voice(
                    item_id,
                    BASE64_STANDARD.encode(&audio),
                    false,
                ));
            }
            SynthesisEvent::Complete(audio) => {
                self.publish(OutboundMessage::assistant_voice(
                    item_id,
                    BASE64_STANDARD.encode(&audio),
                    true,
                ));
                self.schedule_synthesizer_teardown(item_id, self.config.synthesis_teardown);
            }
            SynthesisEvent::Failed(reason) => {
                error!(item_id = %item_id, "Synthesis failed: {}", reason);
                self.schedule_synthesizer_teardown(item_id, Duration::ZERO);
            }
        }
    }

    fn schedule_synthesizer_teardown(self: &Arc<Self>, item_id: &str, delay: Duration) {
        let weak = Arc::downgrade(self);
        let item = item_id.to_string();
        spawn_guarded("synthesis-teardown", async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Some(session) = weak.upgrade() else {
                return;
            };
            let removed = session.pipelines.lock().synthesizers.remove(&item);
            if let Some(synthesizer) = removed {
                if let Err(e) = synthesizer.stop().await {
                    debug!(item_id = %item, "Synthesizer stop failed: {}", e);
                }
                debug!(item_id = %item, "Synthesizer removed");
            }
        });
    }

    // =========================================================================
    // Voice path
    // =========================================================================

    /// Queue an audio chunk; fails immediately when the queue is full.
    pub fn enqueue_voice(&self, chunk: VoiceChunk) -> SessionResult<()> {
        self.voice_tx.try_send(chunk).map_err(|e| {
            let chunk = match e {
                mpsc::error::TrySendError::Full(c) | mpsc::error::TrySendError::Closed(c) => c,
            };
            warn!(item_id = %chunk.item_id, seq = ?chunk.seq, "Voice queue rejected chunk");
            SessionError::QueueFull
        })
    }

    async fn process_voice_chunk(self: &Arc<Self>, chunk: VoiceChunk) {
        self.remember_user(&chunk.user_id);

        let audio = match BASE64_STANDARD.decode(chunk.base64_data.as_bytes()) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(item_id = %chunk.item_id, "Invalid base64 audio: {}", e);
                // The final chunk still has to close the utterance
                if !chunk.is_last() {
                    return;
                }
                Vec::new()
            }
        };

        let recognizer = match self.recognizer_for(&chunk.item_id).await {
            Ok(r) => r,
            Err(e) => {
                error!(item_id = %chunk.item_id, "Failed to start recognition: {}", e);
                return;
            }
        };

        if !audio.is_empty()
            && let Err(e) = recognizer.write(Bytes::from(audio)).await
        {
            warn!(item_id = %chunk.item_id, "Recognition write failed: {}", e);
        }

        if chunk.is_last() {
            // Stopping runs the transcription, which must not hold up other items
            let item_id = chunk.item_id;
            spawn_guarded("recognition-stop", async move {
                if let Err(e) = recognizer.stop().await {
                    warn!(item_id = %item_id, "Recognition stop failed: {}", e);
                }
            });
        }
    }

    async fn recognizer_for(self: &Arc<Self>, item_id: &str) -> SessionResult<BoxedRecognizer> {
        let existing = self
            .pipelines
            .lock()
            .recognizers
            .get(item_id)
            .map(|h| h.recognizer.clone());
        if let Some(recognizer) = existing {
            return Ok(recognizer);
        }

        let weak = Arc::downgrade(self);
        let item = item_id.to_string();
        let callback: RecognitionCallback = Arc::new(move |event| {
            let weak = weak.clone();
            let item = item.clone();
            Box::pin(async move {
                if let Some(session) = weak.upgrade() {
                    session.on_recognition_event(&item, event);
                }
            })
        });

        let recognizer = self.speech.recognizer(item_id, callback)?;
        // Registered before start so the Started event finds its handle
        self.pipelines.lock().recognizers.insert(
            item_id.to_string(),
            RecognitionHandle {
                recognizer: recognizer.clone(),
                voice_id: None,
            },
        );
        if let Err(e) = recognizer.start().await {
            self.pipelines.lock().recognizers.remove(item_id);
            return Err(e.into());
        }
        info!(item_id = %item_id, "Recognition started");
        Ok(recognizer)
    }

    fn item_for_voice(&self, voice_id: &str, fallback: &str) -> String {
        self.pipelines
            .lock()
            .recognizers
            .iter()
            .find(|(_, h)| h.voice_id.as_deref() == Some(voice_id))
            .map(|(item, _)| item.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// React to a recognition pipeline event for `item_id`.
    pub fn on_recognition_event(self: &Arc<Self>, item_id: &str, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started { voice_id } => {
                if let Some(handle) = self.pipelines.lock().recognizers.get_mut(item_id) {
                    handle.voice_id = Some(voice_id);
                }
            }
            RecognitionEvent::UtteranceFinal { text, voice_id } => {
                let item = self.item_for_voice(&voice_id, item_id);
                info!(item_id = %item, voice_id = %voice_id, "Recognized: {}", text);

                let user_id = self.user_id.lock().clone();
                self.publish(OutboundMessage::user_text(
                    user_id.as_str(),
                    item.as_str(),
                    text.as_str(),
                ));

                let session = self.clone();
                spawn_guarded("voice-reply", async move {
                    session.handle_text(&user_id, &item, &text, true).await;
                });
            }
            RecognitionEvent::Ended { voice_id } => {
                let item = self.item_for_voice(&voice_id, item_id);
                if self.pipelines.lock().recognizers.remove(&item).is_some() {
                    debug!(item_id = %item, "Recognition ended");
                }
            }
            RecognitionEvent::Failed { error, voice_id } => {
                let item = self.item_for_voice(&voice_id, item_id);
                error!(item_id = %item, voice_id = %voice_id, "Recognition failed: {}", error);
                let removed = self.pipelines.lock().recognizers.remove(&item);
                if let Some(handle) = removed {
                    spawn_guarded("recognition-teardown", async move {
                        // may already be stopped
                        let _ = handle.recognizer.stop().await;
                    });
                }
            }
        }
    }
}
