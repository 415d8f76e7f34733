use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::base::{ToolError, ToolInvocation, ToolResult};
use super::registry::ToolRegistry;
use crate::core::llm::{ToolCall, ToolDefinition};
use crate::core::progress::ProgressHandle;

/// Decode tool-call arguments into an object.
///
/// Accepts an object, a JSON-encoded object string, or an empty string /
/// `null` (both decode to an empty object).
pub fn decode_arguments(raw: &Value) -> Result<Map<String, Value>, String> {
    match raw {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("expected a JSON object, got {other}")),
            Err(e) => Err(e.to_string()),
        },
        other => Err(format!("expected a JSON object, got {other}")),
    }
}

/// Routes model tool calls to registered tools.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Run the first call in `calls` whose name is registered.
    ///
    /// Later calls in the batch are ignored even when they match.
    pub async fn dispatch(
        &self,
        calls: &[ToolCall],
        progress: ProgressHandle,
    ) -> ToolResult<String> {
        let Some((call, tool)) = calls.iter().find_map(|call| {
            self.registry
                .lookup(&call.function.name)
                .map(|tool| (call, tool))
        }) else {
            let names: Vec<&str> = calls.iter().map(|c| c.function.name.as_str()).collect();
            warn!(requested = ?names, "No registered tool for calls");
            return Err(ToolError::ToolNotFound(names.join(", ")));
        };

        let arguments = decode_arguments(&call.function.arguments).map_err(|reason| {
            ToolError::InvalidArguments {
                name: call.function.name.clone(),
                reason,
            }
        })?;

        if calls.len() > 1 {
            warn!(
                executed = %call.function.name,
                batch = calls.len(),
                "Only the first matching tool call is executed"
            );
        }

        info!(tool = %call.function.name, call_id = %call.id, "Dispatching tool call");
        let invocation = ToolInvocation::new(arguments, call.id.clone(), progress);
        Ok(tool.call(invocation).await)
    }
}
