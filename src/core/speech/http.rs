//! Speech pipelines backed by OpenAI-compatible audio endpoints.
//!
//! Recognition buffers PCM in memory and uploads it as a WAV file to
//! `{base_url}/audio/transcriptions` when the pipeline is stopped.
//! Synthesis posts each text segment to `{base_url}/audio/speech` and streams
//! the raw PCM response back chunk by chunk.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroize;

use super::base::{
    BoxedRecognizer, BoxedSynthesizer, RecognitionCallback, RecognitionEvent, SpeechError,
    SpeechFactory, SpeechRecognizer, SpeechResult, SpeechSynthesizer, SynthesisCallback,
    SynthesisEvent,
};
use crate::utils::validate_llm_endpoint;

/// Upper bound for buffered recognition audio (20MB).
const MAX_BUFFER_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// Connection settings for the speech service.
#[derive(Debug, Clone)]
pub struct HttpSpeechConfig {
    pub api_key: String,
    /// e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
    /// Sample rate of inbound PCM, in Hz
    pub sample_rate: u32,
    pub language: Option<String>,
    pub allow_insecure_localhost: bool,
}

impl Default for HttpSpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            sample_rate: 16000,
            language: None,
            allow_insecure_localhost: false,
        }
    }
}

// =============================================================================
// WAV framing
// =============================================================================

mod wav {
    /// Wrap 16-bit PCM in a 44-byte RIFF header.
    pub fn create_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
        let bits_per_sample: u16 = 16;
        let data_size = pcm.len() as u32;
        let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
        let block_align = channels * bits_per_sample / 8;

        let mut wav = Vec::with_capacity(44 + pcm.len());
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_size).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&channels.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&bits_per_sample.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_size.to_le_bytes());
        wav.extend_from_slice(pcm);
        wav
    }
}

// =============================================================================
// Shared client
// =============================================================================

struct SpeechClient {
    http_client: Client,
    transcriptions_url: Url,
    speech_url: Url,
    api_key: String,
    config: HttpSpeechConfig,
}

impl Drop for SpeechClient {
    fn drop(&mut self) {
        self.api_key.zeroize();
        self.config.api_key.zeroize();
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

fn endpoint(base: &Url, path: &str) -> SpeechResult<Url> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| SpeechError::PipelineStart(format!("Invalid URL: {e}")))
}

/// Factory for the HTTP pipelines; one HTTP client is shared by all of them.
pub struct HttpSpeechFactory {
    client: Arc<SpeechClient>,
}

impl HttpSpeechFactory {
    pub fn new(config: HttpSpeechConfig) -> SpeechResult<Self> {
        let base = validate_llm_endpoint(&config.base_url, config.allow_insecure_localhost)
            .map_err(|e| SpeechError::PipelineStart(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| SpeechError::PipelineStart(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(SpeechClient {
                http_client,
                transcriptions_url: endpoint(&base, "audio/transcriptions")?,
                speech_url: endpoint(&base, "audio/speech")?,
                api_key: config.api_key.clone(),
                config,
            }),
        })
    }
}

impl SpeechFactory for HttpSpeechFactory {
    fn recognizer(
        &self,
        item_id: &str,
        on_event: RecognitionCallback,
    ) -> SpeechResult<BoxedRecognizer> {
        Ok(Arc::new(HttpRecognizer {
            client: self.client.clone(),
            item_id: item_id.to_string(),
            voice_id: format!("voice-{}", uuid::Uuid::new_v4()),
            buffer: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            on_event,
        }))
    }

    fn synthesizer(
        &self,
        item_id: &str,
        on_event: SynthesisCallback,
    ) -> SpeechResult<BoxedSynthesizer> {
        Ok(Arc::new(HttpSynthesizer {
            client: self.client.clone(),
            item_id: item_id.to_string(),
            started: AtomicBool::new(false),
            on_event,
        }))
    }
}

// =============================================================================
// Recognition
// =============================================================================

pub struct HttpRecognizer {
    client: Arc<SpeechClient>,
    item_id: String,
    voice_id: String,
    buffer: Mutex<Vec<u8>>,
    started: AtomicBool,
    on_event: RecognitionCallback,
}

impl HttpRecognizer {
    async fn transcribe(&self, pcm: Vec<u8>) -> SpeechResult<String> {
        let config = &self.client.config;
        info!(
            item_id = %self.item_id,
            bytes = pcm.len(),
            "Sending audio for transcription"
        );

        let wav_data = wav::create_wav(&pcm, config.sample_rate, 1);
        let file_part = Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| SpeechError::Provider(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", config.transcription_model.clone())
            .text("response_format", "json");
        if let Some(language) = &config.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .http_client
            .post(self.client.transcriptions_url.clone())
            .bearer_auth(&self.client.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SpeechError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpeechError::Network(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(SpeechError::Provider(format!(
                "transcription failed ({status}): {body}"
            )));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| SpeechError::Provider(format!("Failed to parse response: {e}")))?;
        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    async fn start(&self) -> SpeechResult<()> {
        self.started.store(true, Ordering::SeqCst);
        (self.on_event)(RecognitionEvent::Started {
            voice_id: self.voice_id.clone(),
        })
        .await;
        Ok(())
    }

    async fn write(&self, audio: Bytes) -> SpeechResult<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SpeechError::NotStarted);
        }
        let mut buffer = self.buffer.lock();
        if buffer.len() + audio.len() > MAX_BUFFER_SIZE_BYTES {
            warn!(item_id = %self.item_id, "Recognition buffer full, dropping audio");
            return Ok(());
        }
        buffer.extend_from_slice(&audio);
        Ok(())
    }

    async fn stop(&self) -> SpeechResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Err(SpeechError::NotStarted);
        }
        let pcm = std::mem::take(&mut *self.buffer.lock());
        let voice_id = self.voice_id.clone();

        if pcm.is_empty() {
            debug!(item_id = %self.item_id, "No audio buffered");
        } else {
            match self.transcribe(pcm).await {
                Ok(text) if !text.is_empty() => {
                    (self.on_event)(RecognitionEvent::UtteranceFinal {
                        text,
                        voice_id: voice_id.clone(),
                    })
                    .await;
                }
                Ok(_) => debug!(item_id = %self.item_id, "Empty transcription"),
                Err(e) => {
                    (self.on_event)(RecognitionEvent::Failed {
                        error: e.to_string(),
                        voice_id,
                    })
                    .await;
                    return Err(e);
                }
            }
        }

        (self.on_event)(RecognitionEvent::Ended { voice_id }).await;
        Ok(())
    }
}

// =============================================================================
// Synthesis
// =============================================================================

pub struct HttpSynthesizer {
    client: Arc<SpeechClient>,
    item_id: String,
    started: AtomicBool,
    on_event: SynthesisCallback,
}

impl HttpSynthesizer {
    async fn stream_speech(&self, text: &str) -> SpeechResult<()> {
        let config = &self.client.config;
        let body = json!({
            "model": config.speech_model,
            "input": text,
            "voice": config.voice,
            "response_format": "pcm",
        });

        let response = self
            .client
            .http_client
            .post(self.client.speech_url.clone())
            .bearer_auth(&self.client.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Provider(format!(
                "speech synthesis failed ({status}): {body}"
            )));
        }

        // Hold one chunk back so the last one can be flagged terminal
        let mut pending: Option<Bytes> = None;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SpeechError::Network(format!("Stream error: {e}")))?;
            if chunk.is_empty() {
                continue;
            }
            if let Some(previous) = pending.replace(chunk) {
                (self.on_event)(SynthesisEvent::AudioChunk(previous)).await;
            }
        }
        (self.on_event)(SynthesisEvent::Complete(pending.unwrap_or_default())).await;
        Ok(())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn start(&self) -> SpeechResult<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, text: &str) -> SpeechResult<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SpeechError::NotStarted);
        }
        if text.trim().is_empty() {
            return Ok(());
        }
        debug!(item_id = %self.item_id, chars = text.len(), "Synthesizing reply");
        if let Err(e) = self.stream_speech(text).await {
            (self.on_event)(SynthesisEvent::Failed(e.to_string())).await;
            return Err(e);
        }
        Ok(())
    }

    async fn stop(&self) -> SpeechResult<()> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }
}
