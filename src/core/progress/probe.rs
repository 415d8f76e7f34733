//! Background loop that asks the model about stale tasks.
//!
//! Every tick, tasks whose snapshot has not changed for the stale threshold
//! are probed: the model is prompted to check the task, the resulting
//! `check_progress` call is executed locally and its result is sent back so
//! the model can phrase a status update for the user. Tasks found finished
//! are retired once the whole pass is over.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::tracker::{ProgressReporter, ProgressTracker};
use crate::core::session::{ConversationSession, SessionResult};
use crate::core::tools::{CHECK_PROGRESS_TOOL, ToolInvocation, decode_arguments};
use crate::utils::now_ms;

/// Substrings of a `check_progress` result that mark a task as finished.
const COMPLETION_MARKERS: &[&str] = &["完成", "done"];

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub interval: Duration,
    pub stale_after: Duration,
    /// Also trust the tracker's `done` flag, not just the result text
    pub structured_completion: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            stale_after: Duration::from_millis(5000),
            structured_completion: true,
        }
    }
}

pub struct ProgressProbe {
    session: Arc<ConversationSession>,
    tracker: Arc<ProgressTracker>,
    config: ProbeConfig,
}

impl ProgressProbe {
    pub fn new(
        session: Arc<ConversationSession>,
        tracker: Arc<ProgressTracker>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            session,
            tracker,
            config,
        }
    }

    /// Tick until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            stale_ms = self.config.stale_after.as_millis() as u64,
            "Progress probe started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Progress probe stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
    }

    /// One pass over the stale tasks. Returns the ids retired in this pass.
    pub async fn probe_once(&self) -> Vec<String> {
        let stale = self
            .tracker
            .take_stale(now_ms(), self.config.stale_after.as_millis() as u64);
        if stale.is_empty() {
            return Vec::new();
        }
        debug!(count = stale.len(), "Probing stale tasks");

        let mut finished = Vec::new();
        for (task_id, _) in stale {
            match self.probe_task(&task_id).await {
                Ok(true) => finished.push(task_id),
                Ok(false) => {}
                Err(e) => warn!(task_id = %task_id, "Progress probe failed: {}", e),
            }
        }

        finished
            .into_iter()
            .filter(|task_id| {
                let removed = self.tracker.remove(task_id);
                if removed {
                    info!(task_id = %task_id, "Task retired");
                }
                removed
            })
            .collect()
    }

    /// Probe one task; `Ok(true)` when it is finished.
    pub async fn probe_task(&self, task_id: &str) -> SessionResult<bool> {
        let prompt = format!("please check progress of task_id:{task_id}");
        let response = self.session.chat_completions(&prompt, true).await?;

        let found = response.assistant_turns().find_map(|turn| {
            turn.tool_calls
                .iter()
                .find(|c| c.function.name == CHECK_PROGRESS_TOOL)
                .map(|call| (turn, call))
        });
        let Some((turn, call)) = found else {
            debug!(task_id = %task_id, "Model did not call check_progress");
            // History must not keep unanswered tool calls
            if response.assistant_turns().any(|t| t.has_tool_calls()) {
                self.session.clear_history();
            }
            return Ok(false);
        };

        let Some(tool) = self.session.dispatcher().registry().lookup(CHECK_PROGRESS_TOOL) else {
            warn!("check_progress tool not registered");
            self.session.clear_history();
            return Ok(false);
        };

        let arguments = match decode_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(reason) => {
                warn!(task_id = %task_id, "Undecodable check_progress arguments: {}", reason);
                self.session.clear_history();
                return Ok(false);
            }
        };
        let result = tool
            .call(ToolInvocation::new(
                arguments,
                call.id.clone(),
                self.tracker.clone(),
            ))
            .await;
        debug!(task_id = %task_id, "check_progress result: {}", result);

        let finished = COMPLETION_MARKERS.iter().any(|m| result.contains(m))
            || (self.config.structured_completion
                && self.tracker.query(task_id).is_some_and(|s| s.done));

        let call_id = turn
            .tool_call_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| call.id.clone());
        // A failed follow-up loses the notice but not the retirement
        match self.session.tool_result_completions(&result, &call_id).await {
            Ok(reply) => {
                if let Some(text) = reply.first_assistant_text() {
                    self.session.publish_assistant(task_id, text);
                }
            }
            Err(e) => warn!(task_id = %task_id, "Progress follow-up failed: {}", e),
        }

        Ok(finished)
    }
}
