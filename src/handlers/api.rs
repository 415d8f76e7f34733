use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::core::progress::ProgressSnapshot;
use crate::state::AppState;

/// Liveness probe.
pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Hidden tools are offered to the model but not advertised to users
    pub user_facing: bool,
}

/// Registered tools in registration order.
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    let tools = state
        .registry
        .tool_names()
        .into_iter()
        .filter_map(|name| state.registry.lookup(name))
        .map(|tool| ToolInfo {
            name: tool.name(),
            description: tool.description(),
            user_facing: tool.user_facing(),
        })
        .collect();
    Json(tools)
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskProgress {
    pub task_id: String,
    #[serde(flatten)]
    pub snapshot: ProgressSnapshot,
}

/// Every task the progress tracker currently holds.
pub async fn list_progress(State(state): State<Arc<AppState>>) -> Json<Vec<TaskProgress>> {
    let tasks = state
        .progress
        .snapshots()
        .into_iter()
        .map(|(task_id, snapshot)| TaskProgress { task_id, snapshot })
        .collect();
    Json(tasks)
}
