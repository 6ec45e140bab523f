use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    agent::{
        agent_model::ActionCandidate,
        loop_detector::LoopDetector,
        milestone::{MilestonePlan, ProgressFlags},
    },
    screen::fingerprint::ScreenFingerprint,
};

pub const STEP_BUDGET_EXHAUSTED: &str = "step budget exhausted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Initializing,
    Running,
    Completed,
    Failed,
    AbortedLoop,
    Aborted,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Initializing | TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Initializing => "INITIALIZING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::AbortedLoop => "ABORTED_LOOP",
            TaskStatus::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Why a run stopped. Distinguishes the failure flavours in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCause {
    CompletionReached,
    StepBudgetExhausted,
    LoopDetected,
    DeviceExecutionFault,
    DeviceCaptureFault,
    ServiceUnavailable,
    Cancelled,
}

impl TerminationCause {
    pub fn status(&self) -> TaskStatus {
        match self {
            TerminationCause::CompletionReached => TaskStatus::Completed,
            TerminationCause::LoopDetected => TaskStatus::AbortedLoop,
            TerminationCause::Cancelled => TaskStatus::Aborted,
            TerminationCause::StepBudgetExhausted
            | TerminationCause::DeviceExecutionFault
            | TerminationCause::DeviceCaptureFault
            | TerminationCause::ServiceUnavailable => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub cause: TerminationCause,
    pub reason: String,
}

/// Per-run progress and status. Owned by exactly one run.
#[derive(Debug, Clone)]
pub struct TaskExecutionState {
    step_index: u32,
    status: TaskStatus,
    progress: ProgressFlags,
    last_fingerprint: Option<ScreenFingerprint>,
    repeated_action_count: u32,
    repeated_screen_count: u32,
    consecutive_service_faults: u32,
    completion_claim: Option<String>,
    termination: Option<Termination>,
}

impl TaskExecutionState {
    pub fn new(plan: MilestonePlan) -> Self {
        Self {
            step_index: 0,
            status: TaskStatus::Initializing,
            progress: ProgressFlags::new(plan),
            last_fingerprint: None,
            repeated_action_count: 0,
            repeated_screen_count: 0,
            consecutive_service_faults: 0,
            completion_claim: None,
            termination: None,
        }
    }

    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> &ProgressFlags {
        &self.progress
    }

    pub fn last_fingerprint(&self) -> Option<&ScreenFingerprint> {
        self.last_fingerprint.as_ref()
    }

    pub fn repeated_action_count(&self) -> u32 {
        self.repeated_action_count
    }

    pub fn repeated_screen_count(&self) -> u32 {
        self.repeated_screen_count
    }

    pub fn consecutive_service_faults(&self) -> u32 {
        self.consecutive_service_faults
    }

    pub fn completion_claim(&self) -> Option<&str> {
        self.completion_claim.as_deref()
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// INITIALIZING -> RUNNING on the first successful snapshot.
    pub fn begin(&mut self, fingerprint: ScreenFingerprint) {
        if self.status == TaskStatus::Initializing {
            self.status = TaskStatus::Running;
        }
        self.last_fingerprint = Some(fingerprint);
    }

    pub fn observe(&mut self, fingerprint: ScreenFingerprint) {
        self.last_fingerprint = Some(fingerprint);
    }

    /// Book an executed action: advance the step counter by exactly one and
    /// update milestones. Returns newly achieved milestone names.
    pub fn record_executed(&mut self, candidate: &ActionCandidate) -> Vec<String> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.step_index += 1;
        if let Some(summary) = &candidate.completes_task {
            self.completion_claim = Some(summary.clone());
        }
        self.progress.apply(candidate)
    }

    pub fn sync_loop_counters(&mut self, detector: &LoopDetector) {
        self.repeated_action_count = detector.repeated_action_count();
        self.repeated_screen_count = detector.repeated_screen_count();
    }

    pub fn note_service_fault(&mut self) {
        self.consecutive_service_faults += 1;
    }

    pub fn clear_service_faults(&mut self) {
        self.consecutive_service_faults = 0;
    }

    /// Move to a terminal status. Terminal states are final: later calls are
    /// ignored and return false.
    pub fn terminate(&mut self, cause: TerminationCause, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = cause.status();
        self.termination = Some(Termination {
            cause,
            reason: reason.into(),
        });
        true
    }
}
