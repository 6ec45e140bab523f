use serde::{Deserialize, Serialize};

use crate::agent::{
    history::{ActionHistoryEntry, HistoryWindow},
    milestone::MilestoneStatus,
    task::Task,
    task_state::{TaskExecutionState, TaskStatus, TerminationCause},
};

// ============================================================================
// Run report: terminal outcome of one task run
// ============================================================================

/// Result of one run, handed back to the caller.
///
/// Built once the state machine is terminal via `from_run()`. Consumed by
/// the console formatter or serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Natural-language instruction
    pub task: String,

    /// Target package, when one was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    pub status: TaskStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<TerminationCause>,

    /// Human-readable reason; never empty for a terminal status
    pub reason: String,

    /// Executed actions (equals the final step index)
    pub steps_taken: u32,

    /// Progress flags in plan order
    pub progress: Vec<MilestoneStatus>,

    /// Summary given by the reasoning service when it declared completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,

    /// Most recent history entries, oldest first
    pub history: Vec<ActionHistoryEntry>,
}

impl RunReport {
    pub fn from_run(
        task: &Task,
        state: &TaskExecutionState,
        history: &HistoryWindow,
        history_len: usize,
    ) -> Self {
        let (cause, reason) = match state.termination() {
            Some(t) => (Some(t.cause), t.reason.clone()),
            None => (None, format!("run ended while {}", state.status())),
        };

        Self {
            task: task.instruction.clone(),
            app: task.app.as_ref().map(|a| a.package.clone()),
            status: state.status(),
            cause,
            reason,
            steps_taken: state.step_index(),
            progress: state.progress().statuses(),
            completion_summary: state.completion_claim().map(str::to_string),
            duration_ms: None,
            history: history.recent(history_len),
        }
    }

    pub fn with_duration(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
