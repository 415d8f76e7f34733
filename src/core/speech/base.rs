//! Speech capability traits shared by the production and fake pipelines.
//!
//! A pipeline is a start/write/stop session bound to one conversational
//! item. Results flow back through an event callback registered when the
//! pipeline is created.

use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// The pipeline could not be created or started
    #[error("Failed to start speech pipeline: {0}")]
    PipelineStart(String),

    /// `write` or `stop` before `start`
    #[error("Speech pipeline not started")]
    NotStarted,

    #[error("Network error: {0}")]
    Network(String),

    /// The speech service rejected the request
    #[error("Provider error: {0}")]
    Provider(String),
}

pub type SpeechResult<T> = Result<T, SpeechError>;

// =============================================================================
// Events
// =============================================================================

/// Events emitted by a recognition pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The service accepted the session and assigned it an id
    Started { voice_id: String },
    UtteranceFinal { text: String, voice_id: String },
    Ended { voice_id: String },
    Failed { error: String, voice_id: String },
}

/// Events emitted by a synthesis pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    AudioChunk(Bytes),
    /// Terminal chunk, possibly empty
    Complete(Bytes),
    Failed(String),
}

pub type RecognitionCallback =
    Arc<dyn Fn(RecognitionEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub type SynthesisCallback =
    Arc<dyn Fn(SynthesisEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Capability traits
// =============================================================================

/// Audio in, text out.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(&self) -> SpeechResult<()>;

    /// Feed raw PCM 16-bit little-endian audio.
    async fn write(&self, audio: Bytes) -> SpeechResult<()>;

    /// End of input; remaining results and `Ended` are delivered before
    /// this returns.
    async fn stop(&self) -> SpeechResult<()>;
}

/// Text in, audio out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn start(&self) -> SpeechResult<()>;

    async fn write(&self, text: &str) -> SpeechResult<()>;

    async fn stop(&self) -> SpeechResult<()>;
}

pub type BoxedRecognizer = Arc<dyn SpeechRecognizer>;
pub type BoxedSynthesizer = Arc<dyn SpeechSynthesizer>;

/// Creates per-item pipelines.
pub trait SpeechFactory: Send + Sync {
    fn recognizer(
        &self,
        item_id: &str,
        on_event: RecognitionCallback,
    ) -> SpeechResult<BoxedRecognizer>;

    fn synthesizer(
        &self,
        item_id: &str,
        on_event: SynthesisCallback,
    ) -> SpeechResult<BoxedSynthesizer>;
}
