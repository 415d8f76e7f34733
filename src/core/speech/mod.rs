//! Per-item speech recognition and synthesis pipelines.

mod base;
mod disabled;
pub mod fake;
mod http;

pub use base::{
    BoxedRecognizer, BoxedSynthesizer, RecognitionCallback, RecognitionEvent, SpeechError,
    SpeechFactory, SpeechRecognizer, SpeechResult, SpeechSynthesizer, SynthesisCallback,
    SynthesisEvent,
};
pub use disabled::DisabledSpeechFactory;
pub use http::{HttpRecognizer, HttpSpeechConfig, HttpSpeechFactory, HttpSynthesizer};
