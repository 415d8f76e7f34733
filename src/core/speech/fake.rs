//! Scripted in-memory pipelines for tests and offline runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::base::{
    BoxedRecognizer, BoxedSynthesizer, RecognitionCallback, RecognitionEvent, SpeechError,
    SpeechFactory, SpeechRecognizer, SpeechResult, SpeechSynthesizer, SynthesisCallback,
    SynthesisEvent,
};

/// Recognizer that reports a fixed transcript when stopped.
pub struct FakeRecognizer {
    voice_id: String,
    transcript: String,
    started: AtomicBool,
    written: Mutex<Vec<u8>>,
    stopped: AtomicBool,
    /// When set, `stop` waits for a notification before finishing
    stop_gate: Option<Arc<Notify>>,
    on_event: RecognitionCallback,
}

impl FakeRecognizer {
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Deliver an arbitrary event as if the service had sent it.
    pub async fn emit(&self, event: RecognitionEvent) {
        (self.on_event)(event).await;
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn start(&self) -> SpeechResult<()> {
        self.started.store(true, Ordering::SeqCst);
        self.emit(RecognitionEvent::Started {
            voice_id: self.voice_id.clone(),
        })
        .await;
        Ok(())
    }

    async fn write(&self, audio: Bytes) -> SpeechResult<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SpeechError::NotStarted);
        }
        self.written.lock().extend_from_slice(&audio);
        Ok(())
    }

    async fn stop(&self) -> SpeechResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Err(SpeechError::NotStarted);
        }
        if let Some(gate) = &self.stop_gate {
            gate.notified().await;
        }
        self.stopped.store(true, Ordering::SeqCst);
        if !self.transcript.is_empty() {
            self.emit(RecognitionEvent::UtteranceFinal {
                text: self.transcript.clone(),
                voice_id: self.voice_id.clone(),
            })
            .await;
        }
        self.emit(RecognitionEvent::Ended {
            voice_id: self.voice_id.clone(),
        })
        .await;
        Ok(())
    }
}

/// Synthesizer that echoes the text bytes back as audio.
pub struct FakeSynthesizer {
    started: AtomicBool,
    fail: bool,
    spoken: Mutex<Vec<String>>,
    stopped: AtomicBool,
    on_event: SynthesisCallback,
}

impl FakeSynthesizer {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn start(&self) -> SpeechResult<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, text: &str) -> SpeechResult<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SpeechError::NotStarted);
        }
        self.spoken.lock().push(text.to_string());
        if self.fail {
            (self.on_event)(SynthesisEvent::Failed("scripted failure".to_string())).await;
            return Err(SpeechError::Provider("scripted failure".to_string()));
        }
        (self.on_event)(SynthesisEvent::AudioChunk(Bytes::copy_from_slice(text.as_bytes()))).await;
        (self.on_event)(SynthesisEvent::Complete(Bytes::new())).await;
        Ok(())
    }

    async fn stop(&self) -> SpeechResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out fake pipelines and keeping them for inspection.
#[derive(Default)]
pub struct FakeSpeechFactory {
    transcript: String,
    fail_start: bool,
    fail_synthesis: bool,
    stop_gate: Option<Arc<Notify>>,
    recognizers: Mutex<HashMap<String, Arc<FakeRecognizer>>>,
    synthesizers: Mutex<HashMap<String, Arc<FakeSynthesizer>>>,
}

impl FakeSpeechFactory {
    /// Recognizers will report `transcript` on stop.
    pub fn with_transcript(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            ..Default::default()
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_synthesis(mut self) -> Self {
        self.fail_synthesis = true;
        self
    }

    /// Recognizers hold in `stop` until `gate` is notified.
    pub fn gated_stop(mut self, gate: Arc<Notify>) -> Self {
        self.stop_gate = Some(gate);
        self
    }

    /// Last recognizer created for `item_id`.
    pub fn recognizer_for(&self, item_id: &str) -> Option<Arc<FakeRecognizer>> {
        self.recognizers.lock().get(item_id).cloned()
    }

    /// Last synthesizer created for `item_id`.
    pub fn synthesizer_for(&self, item_id: &str) -> Option<Arc<FakeSynthesizer>> {
        self.synthesizers.lock().get(item_id).cloned()
    }

    pub fn recognizers_created(&self) -> usize {
        self.recognizers.lock().len()
    }
}

impl SpeechFactory for FakeSpeechFactory {
    fn recognizer(
        &self,
        item_id: &str,
        on_event: RecognitionCallback,
    ) -> SpeechResult<BoxedRecognizer> {
        if self.fail_start {
            return Err(SpeechError::PipelineStart("scripted failure".to_string()));
        }
        let recognizer = Arc::new(FakeRecognizer {
            voice_id: format!("voice-{item_id}"),
            transcript: self.transcript.clone(),
            started: AtomicBool::new(false),
            written: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            stop_gate: self.stop_gate.clone(),
            on_event,
        });
        self.recognizers
            .lock()
            .insert(item_id.to_string(), recognizer.clone());
        Ok(recognizer)
    }

    fn synthesizer(
        &self,
        item_id: &str,
        on_event: SynthesisCallback,
    ) -> SpeechResult<BoxedSynthesizer> {
        if self.fail_start {
            return Err(SpeechError::PipelineStart("scripted failure".to_string()));
        }
        let synthesizer = Arc::new(FakeSynthesizer {
            started: AtomicBool::new(false),
            fail: self.fail_synthesis,
            spoken: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            on_event,
        });
        self.synthesizers
            .lock()
            .insert(item_id.to_string(), synthesizer.clone());
        Ok(synthesizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_callback() -> (RecognitionCallback, Arc<Mutex<Vec<RecognitionEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: RecognitionCallback = Arc::new(move |event| {
            let sink = sink.clone();
            Box::pin(async move { sink.lock().push(event) })
        });
        (callback, events)
    }

    #[tokio::test]
    async fn test_recognizer_lifecycle() {
        let factory = FakeSpeechFactory::with_transcript("hello");
        let (callback, events) = collecting_callback();
        let recognizer = factory.recognizer("item_1", callback).unwrap();

        assert_eq!(
            recognizer.write(Bytes::from_static(b"x")).await,
            Err(SpeechError::NotStarted)
        );
        recognizer.start().await.unwrap();
        recognizer.write(Bytes::from_static(b"pcm")).await.unwrap();
        recognizer.stop().await.unwrap();

        let events = events.lock().clone();
        assert_eq!(
            events,
            vec![
                RecognitionEvent::Started {
                    voice_id: "voice-item_1".into()
                },
                RecognitionEvent::UtteranceFinal {
                    text: "hello".into(),
                    voice_id: "voice-item_1".into()
                },
                RecognitionEvent::Ended {
                    voice_id: "voice-item_1".into()
                },
            ]
        );
        assert_eq!(factory.recognizer_for("item_1").unwrap().written(), b"pcm");
    }
}
