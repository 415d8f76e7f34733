//! HTTP model backend and speech service against wiremock servers.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voice_agent_gateway::core::llm::{
    ChatBackend, ChatCompletionsRequest, ChatTurn, HttpsChatBackend, LlmError, ToolDefinition,
};
use voice_agent_gateway::core::speech::{
    HttpSpeechConfig, HttpSpeechFactory, RecognitionCallback, RecognitionEvent, SpeechFactory,
    SpeechRecognizer, SpeechSynthesizer, SynthesisCallback, SynthesisEvent,
};

fn request() -> ChatCompletionsRequest {
    ChatCompletionsRequest {
        model: "qwen-plus".to_string(),
        messages: vec![ChatTurn::user("hello")],
        tools: vec![ToolDefinition::function(
            "get_current_weather",
            "weather",
            json!({"type": "object"}),
        )],
    }
}

#[tokio::test]
async fn test_chat_backend_posts_bearer_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_current_weather", "arguments": "{\"location\":\"Paris\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpsChatBackend::new(
        &format!("{}/v1/chat/completions", server.uri()),
        "sk-test",
        true,
    )
    .unwrap();
    let response = backend.complete(&request()).await.unwrap();

    let turn = response.assistant_turns().next().unwrap();
    assert_eq!(turn.tool_calls[0].id, "call_1");
    assert_eq!(turn.tool_calls[0].function.name, "get_current_weather");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "qwen-plus");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["tools"][0]["function"]["name"], "get_current_weather");
}

#[tokio::test]
async fn test_chat_backend_maps_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let backend = HttpsChatBackend::new(&server.uri(), "sk-test", true).unwrap();
    let err = backend.complete(&request()).await.unwrap_err();
    match err {
        LlmError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_backend_reports_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let backend = HttpsChatBackend::new(&server.uri(), "sk-test", true).unwrap();
    let err = backend.complete(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::Decode(_)));
}

fn speech_config(server: &MockServer) -> HttpSpeechConfig {
    HttpSpeechConfig {
        api_key: "speech-key".to_string(),
        base_url: format!("{}/v1", server.uri()),
        allow_insecure_localhost: true,
        ..Default::default()
    }
}

fn recognition_sink() -> (RecognitionCallback, Arc<Mutex<Vec<RecognitionEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: RecognitionCallback = Arc::new(move |event| {
        let sink = sink.clone();
        Box::pin(async move { sink.lock().push(event) })
    });
    (callback, events)
}

fn synthesis_sink() -> (SynthesisCallback, Arc<Mutex<Vec<SynthesisEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: SynthesisCallback = Arc::new(move |event| {
        let sink = sink.clone();
        Box::pin(async move { sink.lock().push(event) })
    });
    (callback, events)
}

#[tokio::test]
async fn test_recognizer_uploads_wav_on_stop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer speech-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " hello there "})))
        .expect(1)
        .mount(&server)
        .await;

    let factory = HttpSpeechFactory::new(speech_config(&server)).unwrap();
    let (callback, events) = recognition_sink();
    let recognizer = factory.recognizer("item_1", callback).unwrap();

    recognizer.start().await.unwrap();
    recognizer
        .write(bytes::Bytes::from_static(&[0u8; 320]))
        .await
        .unwrap();
    recognizer.stop().await.unwrap();

    let events = events.lock().clone();
    assert_eq!(events.len(), 3);
    let RecognitionEvent::Started { voice_id } = &events[0] else {
        panic!("expected Started, got {:?}", events[0]);
    };
    assert_eq!(
        events[1],
        RecognitionEvent::UtteranceFinal {
            text: "hello there".to_string(),
            voice_id: voice_id.clone(),
        }
    );
    assert_eq!(
        events[2],
        RecognitionEvent::Ended {
            voice_id: voice_id.clone()
        }
    );

    let received = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains("RIFF"));
    assert!(body.contains("whisper-1"));
}

#[tokio::test]
async fn test_recognizer_reports_service_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let factory = HttpSpeechFactory::new(speech_config(&server)).unwrap();
    let (callback, events) = recognition_sink();
    let recognizer = factory.recognizer("item_1", callback).unwrap();

    recognizer.start().await.unwrap();
    recognizer
        .write(bytes::Bytes::from_static(&[1u8; 64]))
        .await
        .unwrap();
    assert!(recognizer.stop().await.is_err());

    let events = events.lock().clone();
    assert!(matches!(
        events.last(),
        Some(RecognitionEvent::Failed { .. })
    ));
}

#[tokio::test]
async fn test_synthesizer_flags_last_chunk_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
        .expect(1)
        .mount(&server)
        .await;

    let factory = HttpSpeechFactory::new(speech_config(&server)).unwrap();
    let (callback, events) = synthesis_sink();
    let synthesizer = factory.synthesizer("item_1", callback).unwrap();

    synthesizer.start().await.unwrap();
    synthesizer.write("hello").await.unwrap();

    let events = events.lock().clone();
    let total: usize = events
        .iter()
        .map(|e| match e {
            SynthesisEvent::AudioChunk(b) | SynthesisEvent::Complete(b) => b.len(),
            SynthesisEvent::Failed(_) => 0,
        })
        .sum();
    assert_eq!(total, 2048);
    assert!(matches!(events.last(), Some(SynthesisEvent::Complete(_))));

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["input"], "hello");
    assert_eq!(body["voice"], "alloy");
    assert_eq!(body["response_format"], "pcm");
}

#[tokio::test]
async fn test_synthesizer_failure_emits_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let factory = HttpSpeechFactory::new(speech_config(&server)).unwrap();
    let (callback, events) = synthesis_sink();
    let synthesizer = factory.synthesizer("item_1", callback).unwrap();

    synthesizer.start().await.unwrap();
    assert!(synthesizer.write("hello").await.is_err());
    assert!(matches!(
        events.lock().last(),
        Some(SynthesisEvent::Failed(_))
    ));
}
