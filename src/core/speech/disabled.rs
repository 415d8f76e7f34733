use super::base::{
    BoxedRecognizer, BoxedSynthesizer, RecognitionCallback, SpeechError, SpeechFactory,
    SpeechResult, SynthesisCallback,
};

const NOT_CONFIGURED: &str = "speech service not configured";

/// Factory used when no speech credentials are configured; every pipeline
/// fails to start, so voice input is logged and dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSpeechFactory;

impl SpeechFactory for DisabledSpeechFactory {
    fn recognizer(
        &self,
        _item_id: &str,
        _on_event: RecognitionCallback,
    ) -> SpeechResult<BoxedRecognizer> {
        Err(SpeechError::PipelineStart(NOT_CONFIGURED.to_string()))
    }

    fn synthesizer(
        &self,
        _item_id: &str,
        _on_event: SynthesisCallback,
    ) -> SpeechResult<BoxedSynthesizer> {
        Err(SpeechError::PipelineStart(NOT_CONFIGURED.to_string()))
    }
}
