use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::core::tools::{Tool, ToolInvocation};

pub const CHECK_PROGRESS_TOOL: &str = "check_progress";

/// Reports the latest snapshot of a tracked task.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckProgressTool;

#[async_trait]
impl Tool for CheckProgressTool {
    fn name(&self) -> &'static str {
        CHECK_PROGRESS_TOOL
    }

    fn description(&self) -> &'static str {
        "Check the progress of a running task"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {"type": "string", "description": "Task id"}
            },
            "required": ["task_id"]
        })
    }

    fn user_facing(&self) -> bool {
        false
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(task_id) = invocation.str_arg("task_id") else {
            return "invalid task_id arguments for CheckProgressTool".to_string();
        };
        match invocation.progress.query(task_id) {
            Some(snapshot) => {
                debug!(task_id = %task_id, progress = snapshot.progress, "Progress lookup");
                format!(
                    "current progress: {:.2}%, message: {}",
                    snapshot.percent(),
                    snapshot.message
                )
            }
            None => "No progress information found".to_string(),
        }
    }
}
