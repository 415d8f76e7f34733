use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::llm::ToolDefinition;
use crate::core::progress::ProgressHandle;

/// Errors raised while routing a batch of tool calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("no registered tool matches the requested calls: {0}")]
    ToolNotFound(String),
    #[error("invalid arguments for tool {name}: {reason}")]
    InvalidArguments { name: String, reason: String },
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Call-scoped context handed to a tool.
pub struct ToolInvocation {
    /// Decoded argument object; always carries `call_id`.
    pub arguments: Map<String, Value>,
    /// Id of the tool call, doubling as the progress task id.
    pub call_id: String,
    pub progress: ProgressHandle,
}

impl ToolInvocation {
    pub fn new(
        mut arguments: Map<String, Value>,
        call_id: impl Into<String>,
        progress: ProgressHandle,
    ) -> Self {
        let call_id = call_id.into();
        arguments.insert("call_id".to_string(), Value::String(call_id.clone()));
        Self {
            arguments,
            call_id,
            progress,
        }
    }

    /// Non-empty string argument.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// String list argument; a single string is accepted as a one-item list.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.arguments.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }
}

/// A callable exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the argument object.
    fn parameters(&self) -> Value;

    /// Internal tools stay out of the startup listing.
    fn user_facing(&self) -> bool {
        true
    }

    /// Run the tool. Failures are reported in the returned text, which
    /// becomes the tool-result turn.
    async fn call(&self, invocation: ToolInvocation) -> String;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ProgressTracker;
    use serde_json::json;
    use std::sync::Arc;

    fn invocation(args: Value) -> ToolInvocation {
        let map = args.as_object().cloned().unwrap_or_default();
        ToolInvocation::new(map, "call_1", Arc::new(ProgressTracker::new()))
    }

    #[test]
    fn test_call_id_injected() {
        let inv = invocation(json!({"location": "Shenzhen"}));
        assert_eq!(inv.arguments["call_id"], "call_1");
        assert_eq!(inv.str_arg("location"), Some("Shenzhen"));
    }

    #[test]
    fn test_blank_string_is_missing() {
        let inv = invocation(json!({"unit": "  "}));
        assert_eq!(inv.str_arg("unit"), None);
        assert_eq!(inv.str_arg("absent"), None);
    }

    #[test]
    fn test_string_list() {
        let inv = invocation(json!({"files": ["a.mp4", "b.mp4", 3], "one": "c.mp4"}));
        assert_eq!(inv.string_list("files"), vec!["a.mp4", "b.mp4"]);
        assert_eq!(inv.string_list("one"), vec!["c.mp4"]);
        assert!(inv.string_list("none").is_empty());
    }
}
