use crate::agent::task_state::{STEP_BUDGET_EXHAUSTED, TaskExecutionState, TerminationCause};

/// Facts gathered during one step, fed to the stop gates.
#[derive(Debug, Clone, Default)]
pub struct StepSignals {
    pub completed: bool,
    pub loop_abort: Option<String>,
    pub fault: Option<(TerminationCause, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopDecision {
    Continue,
    Stop(TerminationCause, String),
}

/// Stopping conditions in fixed priority order; the first that holds wins.
pub fn check_stop(state: &TaskExecutionState, signals: &StepSignals, max_steps: u32) -> StopDecision {
    // ---- Completion ----
    if signals.completed {
        let reason = match state.completion_claim() {
            Some(summary) => format!("task completed: {}", summary),
            None => "task completed: completion criteria met".to_string(),
        };
        return StopDecision::Stop(TerminationCause::CompletionReached, reason);
    }

    // ---- Step budget ----
    if state.step_index() >= max_steps {
        return StopDecision::Stop(
            TerminationCause::StepBudgetExhausted,
            STEP_BUDGET_EXHAUSTED.to_string(),
        );
    }

    // ---- Loop ----
    if let Some(reason) = &signals.loop_abort {
        return StopDecision::Stop(TerminationCause::LoopDetected, reason.clone());
    }

    // ---- Faults ----
    if let Some((cause, reason)) = &signals.fault {
        return StopDecision::Stop(*cause, reason.clone());
    }

    StopDecision::Continue
}
