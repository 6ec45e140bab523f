use std::time::Instant;

use tracing::{info, warn};

use crate::{
    agent::{
        budget::{StepSignals, StopDecision, check_stop},
        cancel::CancellationToken,
        completion::{CompletionPredicate, MilestoneCompletion},
        coordinator::ActionCoordinator,
        history::ExecutionOutcome,
        milestone::MilestonePlan,
        task_state::{TaskExecutionState, TerminationCause},
    },
    device::device_model::DeviceCollaborator,
    report::report_model::RunReport,
    screen::fingerprint::fingerprint,
    trace::{logger::TraceLogger, trace::TraceEvent},
};

pub const CANCELLED: &str = "cancelled by caller";

/// Drives one task from the first snapshot to a terminal status.
///
/// Owns the coordinator (and through it the device) for the whole run; the
/// device is released when the runner is consumed by [`TaskRunner::run`].
pub struct TaskRunner<D: DeviceCollaborator> {
    coordinator: ActionCoordinator<D>,
    plan: MilestonePlan,
    completion: Box<dyn CompletionPredicate>,
    cancel: CancellationToken,
    tracer: TraceLogger,
}

impl<D: DeviceCollaborator> TaskRunner<D> {
    pub fn new(coordinator: ActionCoordinator<D>) -> Self {
        Self {
            coordinator,
            plan: MilestonePlan::default(),
            completion: Box::new(MilestoneCompletion::default()),
            cancel: CancellationToken::new(),
            tracer: TraceLogger::disabled(),
        }
    }

    pub fn with_plan(mut self, plan: MilestonePlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_completion(mut self, completion: Box<dyn CompletionPredicate>) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = tracer;
        self
    }

    /// Token that cancels this run at the next step boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(mut self) -> RunReport {
        let started = Instant::now();
        let mut state = TaskExecutionState::new(self.plan.clone());

        info!(task = %self.coordinator.task().instruction, "starting run");
        self.drive(&mut state);

        let config = self.coordinator.config();
        if let Some(t) = state.termination() {
            info!(
                status = %state.status(),
                steps = state.step_index(),
                reason = %t.reason,
                "run finished"
            );
        }

        RunReport::from_run(
            self.coordinator.task(),
            &state,
            self.coordinator.history(),
            config.report_history_len,
        )
        .with_duration(started.elapsed().as_millis())
    }

    fn drive(&mut self, state: &mut TaskExecutionState) {
        // ---- Prepare + first snapshot ----
        let task = self.coordinator.task().clone();
        if let Err(e) = self.coordinator.device_mut().prepare(&task) {
            state.terminate(
                TerminationCause::DeviceExecutionFault,
                format!("device execution fault: could not launch target app: {}", e),
            );
            return;
        }

        let mut snapshot = match self.coordinator.capture() {
            Ok(s) => s,
            Err(e) => {
                state.terminate(
                    TerminationCause::DeviceCaptureFault,
                    format!("device capture fault: {}", e),
                );
                return;
            }
        };
        state.begin(fingerprint(&snapshot));

        let max_steps = self.coordinator.config().max_steps;
        let max_loop_recoveries = self.coordinator.config().max_loop_recoveries;
        let max_service_faults = self.coordinator.config().max_consecutive_service_faults;

        // ---- Step loop ----
        while !state.is_terminal() {
            if self.cancel.is_cancelled() {
                state.terminate(TerminationCause::Cancelled, CANCELLED);
                self.tracer
                    .log(&TraceEvent::now(state.step_index(), state.status()).with_suppression(CANCELLED));
                break;
            }

            let before_progress = state.progress().statuses();
            let entry = self.coordinator.decide_and_execute(state, &snapshot);
            let mut signals = StepSignals::default();

            match &entry.outcome {
                ExecutionOutcome::Executed { .. } => match self.coordinator.capture() {
                    Ok(next) => {
                        let after = fingerprint(&next);
                        self.coordinator.observe_after(&after);
                        state.observe(after);
                        snapshot = next;
                    }
                    Err(e) => {
                        signals.fault = Some((
                            TerminationCause::DeviceCaptureFault,
                            format!("device capture fault: {}", e),
                        ));
                    }
                },
                ExecutionOutcome::Faulted { attempts, error } => {
                    signals.fault = Some((
                        TerminationCause::DeviceExecutionFault,
                        format!("device execution fault after {} attempts: {}", attempts, error),
                    ));
                }
            }

            signals.completed =
                entry.outcome.is_executed() && self.completion.is_complete(state, &snapshot);

            let recoveries = self.coordinator.loop_detector().recoveries_without_progress();
            if recoveries > max_loop_recoveries {
                let looping = entry
                    .discarded
                    .as_ref()
                    .map(|c| c.signature())
                    .unwrap_or_else(|| entry.candidate.signature());
                signals.loop_abort = Some(format!(
                    "loop detected: '{}' repeated on an already visited screen and recovery made no progress",
                    looping
                ));
            }

            if signals.fault.is_none() && state.consecutive_service_faults() > max_service_faults {
                signals.fault = Some((
                    TerminationCause::ServiceUnavailable,
                    format!(
                        "inference service failed on {} consecutive steps",
                        state.consecutive_service_faults()
                    ),
                ));
            }

            let achieved: Vec<String> = state
                .progress()
                .statuses()
                .into_iter()
                .zip(before_progress)
                .filter(|(now, before)| now.achieved && !before.achieved)
                .map(|(now, _)| now.name)
                .collect();

            if let StopDecision::Stop(cause, reason) = check_stop(state, &signals, max_steps) {
                if cause == TerminationCause::CompletionReached {
                    info!(step = state.step_index(), %reason, "completion reached");
                } else {
                    warn!(step = state.step_index(), ?cause, %reason, "stopping run");
                }
                state.terminate(cause, reason);
            }

            self.tracer.log(
                &TraceEvent::now(state.step_index(), state.status())
                    .with_entry(&entry)
                    .with_milestones(&achieved),
            );
        }
    }
}
