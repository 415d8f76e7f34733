//! Tool dispatch over the built-in registry plus a counting probe tool.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use voice_agent_gateway::core::llm::ToolCall;
use voice_agent_gateway::core::media::MediaToolkit;
use voice_agent_gateway::core::progress::{ProgressReporter, ProgressSnapshot, ProgressTracker};
use voice_agent_gateway::core::tools::{
    Tool, ToolDispatcher, ToolError, ToolInvocation, ToolRegistry, builtin_registry,
};

struct CountingTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &'static str {
        "count_calls"
    }

    fn description(&self) -> &'static str {
        "Counts how often it runs"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        format!(
            "call #{n} with id {}",
            invocation.str_arg("call_id").unwrap_or_default()
        )
    }
}

fn dispatcher_with_counter() -> (ToolDispatcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = builtin_registry(Arc::new(MediaToolkit::default()));
    registry.register(CountingTool {
        calls: calls.clone(),
    });
    (ToolDispatcher::new(Arc::new(registry)), calls)
}

#[tokio::test]
async fn test_only_first_matching_call_runs() {
    let (dispatcher, calls) = dispatcher_with_counter();
    let batch = vec![
        ToolCall::new("c0", "unknown_tool", json!({})),
        ToolCall::new("c1", "count_calls", json!({})),
        ToolCall::new("c2", "count_calls", json!({})),
    ];

    let result = dispatcher
        .dispatch(&batch, Arc::new(ProgressTracker::new()))
        .await
        .unwrap();

    assert_eq!(result, "call #1 with id c1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_match_runs_nothing() {
    let (dispatcher, calls) = dispatcher_with_counter();
    let batch = vec![
        ToolCall::new("c0", "unknown_a", json!({})),
        ToolCall::new("c1", "unknown_b", json!({})),
    ];

    let err = dispatcher
        .dispatch(&batch, Arc::new(ProgressTracker::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::ToolNotFound(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undecodable_arguments_on_matched_call() {
    let (dispatcher, calls) = dispatcher_with_counter();
    let batch = vec![ToolCall::new("c1", "count_calls", json!("{not json"))];

    let err = dispatcher
        .dispatch(&batch, Arc::new(ProgressTracker::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::InvalidArguments { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_weather_without_unit() {
    let (dispatcher, _) = dispatcher_with_counter();
    let batch = vec![ToolCall::new(
        "c1",
        "get_current_weather",
        json!(r#"{"location":"Paris"}"#),
    )];

    let result = dispatcher
        .dispatch(&batch, Arc::new(ProgressTracker::new()))
        .await
        .unwrap();
    assert_eq!(result, "invalid unit arguments for GetWeather");
}

#[tokio::test]
async fn test_weather_with_empty_string_arguments() {
    let (dispatcher, _) = dispatcher_with_counter();
    let batch = vec![ToolCall::new("c1", "get_current_weather", json!(""))];

    let result = dispatcher
        .dispatch(&batch, Arc::new(ProgressTracker::new()))
        .await
        .unwrap();
    assert_eq!(result, "invalid location arguments for GetWeather");
}

#[tokio::test]
async fn test_check_progress_reads_injected_tracker() {
    let (dispatcher, _) = dispatcher_with_counter();
    let tracker = Arc::new(ProgressTracker::new());
    tracker.report("call_42", ProgressSnapshot::new(0.5, "transcoding", false));

    let found = dispatcher
        .dispatch(
            &[ToolCall::new(
                "c1",
                "check_progress",
                json!({"task_id": "call_42"}),
            )],
            tracker.clone(),
        )
        .await
        .unwrap();
    assert_eq!(found, "current progress: 50.00%, message: transcoding");

    let missing = dispatcher
        .dispatch(
            &[ToolCall::new(
                "c2",
                "check_progress",
                json!({"task_id": "call_404"}),
            )],
            tracker,
        )
        .await
        .unwrap();
    assert_eq!(missing, "No progress information found");
}

#[test]
fn test_describe_hides_internal_tools() {
    let registry: ToolRegistry = builtin_registry(Arc::new(MediaToolkit::default()));
    let description = registry.describe();
    assert!(!description.contains("get_current_weather"));
    assert!(!description.contains("check_progress"));
    assert!(description.contains("transcode_with_progress"));
    assert_eq!(description.lines().count(), 10);
    assert_eq!(registry.definitions().len(), 12);
}
