use crate::{agent::task_state::TaskExecutionState, screen::screen_model::ScreenSnapshot};

pub trait CompletionPredicate {
    fn is_complete(&self, state: &TaskExecutionState, snapshot: &ScreenSnapshot) -> bool;
}

/// Done when the reasoning service declared completion on an executed step,
/// or when every milestone is achieved and the screen shows a result marker.
pub struct MilestoneCompletion {
    pub result_markers: Vec<String>,
}

impl Default for MilestoneCompletion {
    fn default() -> Self {
        Self {
            result_markers: ["results", "filter", "sort by"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl CompletionPredicate for MilestoneCompletion {
    fn is_complete(&self, state: &TaskExecutionState, snapshot: &ScreenSnapshot) -> bool {
        if state.completion_claim().is_some() {
            return true;
        }

        state.progress().all_achieved()
            && self
                .result_markers
                .iter()
                .any(|m| snapshot.tree.contains_text(m))
    }
}

/// Never satisfied; the run ends by budget, loop or fault.
pub struct NeverComplete;

impl CompletionPredicate for NeverComplete {
    fn is_complete(&self, _state: &TaskExecutionState, _snapshot: &ScreenSnapshot) -> bool {
        false
    }
}
