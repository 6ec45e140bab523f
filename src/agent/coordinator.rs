use tracing::{debug, info, warn};

use crate::{
    agent::{
        agent_model::{ActionCandidate, Provenance, Strategy, StrategyContext},
        config::AgentConfig,
        error::DeviceFault,
        history::{ActionHistoryEntry, ExecutionOutcome, HistoryWindow},
        last_resort::{default_candidate, recovery_candidate},
        loop_detector::LoopDetector,
        task::Task,
        task_state::TaskExecutionState,
    },
    device::device_model::DeviceCollaborator,
    screen::{
        fingerprint::{ScreenFingerprint, fingerprint},
        scaler::normalize_candidate,
        screen_model::ScreenSnapshot,
    },
};

/// Runs the strategy chain, guards against loops and drives the device.
///
/// The only component that changes device state. Owns the run's loop
/// detector and history window so concurrent runs share nothing.
pub struct ActionCoordinator<D: DeviceCollaborator> {
    task: Task,
    config: AgentConfig,
    strategies: Vec<Box<dyn Strategy>>,
    loop_detector: LoopDetector,
    history: HistoryWindow,
    device: D,
}

/// Result of walking the strategy chain once.
struct Proposal {
    candidate: ActionCandidate,
    service_fault: bool,
}

impl<D: DeviceCollaborator> ActionCoordinator<D> {
    pub fn new(task: Task, config: AgentConfig, strategies: Vec<Box<dyn Strategy>>, device: D) -> Self {
        let loop_detector = LoopDetector::new(config.history_window, config.repetition_threshold);
        let history = HistoryWindow::new(config.history_window);
        Self {
            task,
            config,
            strategies,
            loop_detector,
            history,
            device,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn loop_detector(&self) -> &LoopDetector {
        &self.loop_detector
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Capture a snapshot, retrying device faults with the configured count.
    pub fn capture(&mut self) -> Result<ScreenSnapshot, DeviceFault> {
        let attempts = self.config.device_retry_count + 1;
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.device.capture_snapshot() {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    warn!(attempt, err = %e, "screen capture failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DeviceFault::Other("capture never attempted".into())))
    }

    /// Book the screen observed after the last executed action.
    pub fn observe_after(&mut self, after: &ScreenFingerprint) {
        self.loop_detector.observe_screen(after);
        if let Some(last) = self.history.last_mut() {
            last.after = Some(after.clone());
        }
    }

    /// One step: pick a candidate, guard it, execute it and book the result.
    ///
    /// Always yields an entry; a candidate is chosen even when every
    /// strategy declines.
    pub fn decide_and_execute(
        &mut self,
        state: &mut TaskExecutionState,
        snapshot: &ScreenSnapshot,
    ) -> ActionHistoryEntry {
        let step = state.step_index() + 1;
        let before = fingerprint(snapshot);

        // ---- 1-3: strategy chain ----
        let proposal = self.propose(state, snapshot);
        if proposal.service_fault {
            state.note_service_fault();
        } else {
            state.clear_service_faults();
        }

        // ---- 4: coordinate normalization ----
        let mut candidate = normalize_candidate(proposal.candidate, snapshot.resolution);

        // ---- 5: loop guard, at most one substitution ----
        let mut discarded = None;
        if self.loop_detector.check(&candidate.signature(), &before) {
            let recovery = recovery_candidate(&candidate);
            warn!(
                step,
                signature = %candidate.signature(),
                recovery = %recovery.signature(),
                "repetition on a visited screen, substituting recovery action"
            );
            self.loop_detector.note_recovery();
            discarded = Some(std::mem::replace(&mut candidate, recovery));
        }

        // ---- 6: execute with retries ----
        let outcome = self.execute_with_retries(step, &candidate);

        // ---- 7: book ----
        if outcome.is_executed() {
            let achieved = state.record_executed(&candidate);
            for name in &achieved {
                info!(step, milestone = %name, "milestone achieved");
            }
            self.loop_detector.record(&candidate.signature(), &before);
            state.sync_loop_counters(&self.loop_detector);
        }

        let entry = ActionHistoryEntry {
            step_index: step,
            provenance: candidate.provenance,
            candidate,
            before,
            after: None,
            discarded,
            outcome,
        };
        self.history.push(entry.clone());
        entry
    }

    fn propose(&mut self, state: &TaskExecutionState, snapshot: &ScreenSnapshot) -> Proposal {
        let recent = self.history.recent(self.config.prompt_history_len);
        let ctx = StrategyContext {
            task: &self.task,
            state,
            snapshot,
            recent: &recent,
            max_steps: self.config.max_steps,
        };

        let mut service_fault = false;
        for strategy in self.strategies.iter_mut() {
            let provenance = strategy.provenance();
            match strategy.propose(&ctx) {
                Ok(Some(candidate)) => {
                    if meets_floor(&self.config, &candidate) {
                        debug!(
                            %provenance,
                            signature = %candidate.signature(),
                            confidence = ?candidate.confidence,
                            "candidate accepted"
                        );
                        return Proposal {
                            candidate,
                            service_fault,
                        };
                    }
                    debug!(
                        %provenance,
                        confidence = ?candidate.confidence,
                        "candidate below confidence floor"
                    );
                }
                Ok(None) => debug!(%provenance, "no candidate"),
                Err(e) => {
                    warn!(%provenance, err = %e, "strategy failed, falling through");
                    service_fault = true;
                }
            }
        }

        warn!("no strategy produced a candidate, using default");
        Proposal {
            candidate: default_candidate(),
            service_fault,
        }
    }

    fn execute_with_retries(&mut self, step: u32, candidate: &ActionCandidate) -> ExecutionOutcome {
        let attempts = self.config.device_retry_count + 1;
        let mut last_err = String::new();

        for attempt in 1..=attempts {
            match self.device.execute(candidate) {
                Ok(_) => {
                    info!(
                        step,
                        provenance = %candidate.provenance,
                        signature = %candidate.signature(),
                        attempt,
                        "action executed"
                    );
                    return ExecutionOutcome::Executed { attempts: attempt };
                }
                Err(e) => {
                    warn!(step, attempt, err = %e, "action execution failed");
                    last_err = e.to_string();
                }
            }
        }

        ExecutionOutcome::Faulted {
            attempts,
            error: last_err,
        }
    }
}

/// Per-provenance acceptance. Last-resort candidates are always accepted.
fn meets_floor(config: &AgentConfig, candidate: &ActionCandidate) -> bool {
    let floor = match candidate.provenance {
        Provenance::Inference => config.inference_min_confidence,
        Provenance::Structural => config.structural_min_confidence,
        Provenance::LastResort => return true,
    };
    candidate.confidence.is_some_and(|c| c >= floor)
}
