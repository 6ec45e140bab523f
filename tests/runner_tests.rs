use mobile_agent::{
    agent::{
        agent_model::{
            Action, ActionCandidate, Point, Provenance, ScrollDirection, ScrollExtent, Strategy,
            StrategyContext,
        },
        ai_model::InferenceStrategy,
        cancel::CancellationToken,
        completion::NeverComplete,
        config::AgentConfig,
        coordinator::ActionCoordinator,
        error::AgentResult,
        history::ExecutionOutcome,
        last_resort::LastResortStrategy,
        milestone::MilestonePlan,
        runner::{CANCELLED, TaskRunner},
        structural::StructuralStrategy,
        task::Task,
        task_state::{STEP_BUDGET_EXHAUSTED, TaskExecutionState, TaskStatus, TerminationCause},
    },
    device::device_model::DeviceCollaborator,
    report::console::format_console_report,
    screen::{fingerprint::fingerprint, screen_model::ScreenSnapshot},
};

use crate::common::{
    device::ScriptedDevice,
    inference::{Reply, ScriptedInference},
    screens,
};

mod common;

// =========================================================================
// Helpers
// =========================================================================

fn task() -> Task {
    Task::new("search for shoes on flipkart", None)
}

fn chain(inference: ScriptedInference, config: &AgentConfig) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(InferenceStrategy::new(
            Box::new(inference),
            config.inference_timeout(),
            config.reference_max_dimension,
        )),
        Box::new(StructuralStrategy),
        Box::new(LastResortStrategy),
    ]
}

fn offline_chain() -> Vec<Box<dyn Strategy>> {
    vec![Box::new(StructuralStrategy), Box::new(LastResortStrategy)]
}

fn coordinator(
    config: AgentConfig,
    strategies: Vec<Box<dyn Strategy>>,
    device: ScriptedDevice,
) -> ActionCoordinator<ScriptedDevice> {
    ActionCoordinator::new(task(), config, strategies, device)
}

fn running_state(device: &mut ScriptedDevice) -> (TaskExecutionState, ScreenSnapshot) {
    let snapshot = device.capture_snapshot().unwrap();
    let mut state = TaskExecutionState::new(MilestonePlan::default());
    state.begin(fingerprint(&snapshot));
    (state, snapshot)
}

// =========================================================================
// Action coordinator
// =========================================================================

#[test]
fn structural_wins_when_inference_has_no_candidate() {
    let config = AgentConfig::default();
    let inference = ScriptedInference::repeating("I am not sure what to do here.");
    let mut device = ScriptedDevice::fixed(screens::search_home());
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config.clone(), chain(inference, &config), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.provenance, Provenance::Structural);
    assert_eq!(
        entry.candidate.action,
        Action::Tap {
            at: Point::new(512, 170)
        }
    );
    assert!(entry.outcome.is_executed());
    assert_eq!(state.step_index(), 1);
    assert_eq!(state.consecutive_service_faults(), 0);
    assert!(state.progress().is_achieved("search_initiated"));
}

#[test]
fn inference_candidate_is_scaled_to_device_pixels() {
    let config = AgentConfig::default();
    let inference = ScriptedInference::repeating("TAP (256,85) # Search bar");
    let mut device = ScriptedDevice::fixed(screens::search_home());
    let executed = device.executed();
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config.clone(), chain(inference, &config), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.provenance, Provenance::Inference);
    assert_eq!(
        executed.borrow()[0].action,
        Action::Tap {
            at: Point::new(512, 170)
        }
    );
}

#[test]
fn low_confidence_inference_falls_through() {
    let config = AgentConfig {
        inference_min_confidence: 0.8,
        ..AgentConfig::default()
    };
    // loose match scores below the raised floor
    let inference = ScriptedInference::repeating("maybe scroll down a little");
    let mut device = ScriptedDevice::fixed(screens::search_home());
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config.clone(), chain(inference, &config), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.provenance, Provenance::Structural);
}

/// Proposes the same tap with a fixed confidence.
struct FixedConfidence(Provenance, f32);

impl Strategy for FixedConfidence {
    fn provenance(&self) -> Provenance {
        self.0
    }

    fn propose(&mut self, _ctx: &StrategyContext<'_>) -> AgentResult<Option<ActionCandidate>> {
        Ok(Some(
            ActionCandidate::new(
                Action::Tap {
                    at: Point::new(10, 10),
                },
                self.0,
            )
            .with_confidence(self.1),
        ))
    }
}

#[test]
fn confidence_exactly_at_the_floor_is_accepted() {
    let config = AgentConfig::default();
    let cases = [
        (Provenance::Inference, config.inference_min_confidence, Provenance::Inference),
        (Provenance::Structural, config.structural_min_confidence, Provenance::Structural),
        (Provenance::Structural, config.structural_min_confidence - 0.01, Provenance::LastResort),
        (Provenance::Inference, config.inference_min_confidence - 0.01, Provenance::LastResort),
    ];

    for (provenance, confidence, expected) in cases {
        let mut device = ScriptedDevice::fixed(screens::blank());
        let (mut state, snapshot) = running_state(&mut device);
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(FixedConfidence(provenance, confidence)),
            Box::new(LastResortStrategy),
        ];

        let mut coordinator = coordinator(config.clone(), strategies, device);
        let entry = coordinator.decide_and_execute(&mut state, &snapshot);

        assert_eq!(
            entry.provenance, expected,
            "{:?} at confidence {}",
            provenance, confidence
        );
    }
}

#[test]
fn coordinator_always_yields_an_action() {
    let config = AgentConfig::default();
    let mut device = ScriptedDevice::fixed(screens::blank());
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(
        config.clone(),
        chain(ScriptedInference::unavailable(), &config),
        device,
    );
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.provenance, Provenance::LastResort);
    assert!(entry.outcome.is_executed());
    assert_eq!(state.consecutive_service_faults(), 1);
}

#[test]
fn empty_chain_still_yields_an_action() {
    let mut device = ScriptedDevice::fixed(screens::blank());
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(AgentConfig::default(), Vec::new(), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.candidate.action, Action::GoBack);
    assert_eq!(entry.provenance, Provenance::LastResort);
}

#[test]
fn device_faults_are_retried_with_the_same_candidate() {
    let config = AgentConfig::default();
    let mut device = ScriptedDevice::fixed(screens::search_home()).failing_executions(2);
    let executed = device.executed();
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config, offline_chain(), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.outcome, ExecutionOutcome::Executed { attempts: 3 });
    assert_eq!(executed.borrow().len(), 1);
    assert_eq!(state.step_index(), 1);
}

#[test]
fn exhausted_retries_do_not_advance_the_step() {
    let config = AgentConfig::default();
    let mut device = ScriptedDevice::fixed(screens::search_home()).failing_executions(3);
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config, offline_chain(), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert!(matches!(entry.outcome, ExecutionOutcome::Faulted { attempts: 3, .. }));
    assert_eq!(state.step_index(), 0);
    assert_eq!(coordinator.history().len(), 1);
}

#[test]
fn history_window_is_bounded() {
    let config = AgentConfig {
        history_window: 3,
        ..AgentConfig::default()
    };
    let mut device = ScriptedDevice::ever_changing();
    let (mut state, mut snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config, offline_chain(), device);
    for i in 1..=6 {
        coordinator.decide_and_execute(&mut state, &snapshot);
        snapshot = screens::numbered(i);
    }

    assert_eq!(coordinator.history().len(), 3);
    assert_eq!(state.step_index(), 6);
}

// =========================================================================
// Runner scenarios
// =========================================================================

#[test]
fn completes_on_step_four() {
    let config = AgentConfig::default();
    let inference = ScriptedInference::texts(&[
        "TAP (256,85) # Search bar",
        "TYPE 'shoes'",
        "SCROLL down",
        "TASK_COMPLETE: shoes are listed",
    ]);
    let device = ScriptedDevice::ever_changing();

    let report = TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device)).run();

    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(report.steps_taken, 4);
    assert_eq!(report.cause, Some(TerminationCause::CompletionReached));
    assert_eq!(report.completion_summary.as_deref(), Some("shoes are listed"));
    assert!(report.progress.iter().all(|m| m.achieved));
    assert!(report.succeeded());
}

#[test]
fn repeated_tap_on_unchanged_screen_aborts_with_recovery() {
    let config = AgentConfig::default();
    let inference = ScriptedInference::repeating("TAP (100,100)");
    let device = ScriptedDevice::fixed(screens::blank());
    let executed = device.executed();

    let report = TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device)).run();

    assert_eq!(report.status, TaskStatus::AbortedLoop);
    assert_eq!(report.steps_taken, config.repetition_threshold);
    assert!(report.reason.contains("loop"));

    let last = report.history.last().expect("history");
    assert_eq!(last.step_index, config.repetition_threshold);
    assert!(last.was_loop_recovery());
    assert_eq!(last.provenance, Provenance::LastResort);
    assert_eq!(
        last.candidate.action,
        Action::Scroll {
            direction: ScrollDirection::Down,
            extent: ScrollExtent::Medium,
        }
    );
    assert_eq!(
        last.discarded.as_ref().map(|c| c.action.clone()),
        Some(Action::Tap {
            at: Point::new(200, 200)
        })
    );

    // the looping tap itself was never sent a second time
    let taps = executed
        .borrow()
        .iter()
        .filter(|c| matches!(c.action, Action::Tap { .. }))
        .count();
    assert_eq!(taps, 1);
}

#[test]
fn tolerated_recoveries_delay_the_abort() {
    let config = AgentConfig {
        max_loop_recoveries: 1,
        ..AgentConfig::default()
    };
    let inference = ScriptedInference::repeating("TAP (100,100)");
    let device = ScriptedDevice::fixed(screens::blank());

    let report = TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device)).run();

    assert_eq!(report.status, TaskStatus::AbortedLoop);
    assert_eq!(report.steps_taken, 4);
}

#[test]
fn bouncing_between_two_screens_aborts() {
    let config = AgentConfig::default();
    let replies: Vec<&str> = (0..20)
        .map(|i| if i % 2 == 0 { "TAP (100,100)" } else { "BACK" })
        .collect();
    let inference = ScriptedInference::texts(&replies);
    // tap leads to the second screen, back returns to the first
    let device = ScriptedDevice::new(|i| screens::numbered(i % 2));

    let report = TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device)).run();

    assert_eq!(report.status, TaskStatus::AbortedLoop);
    assert_eq!(report.cause, Some(TerminationCause::LoopDetected));
    assert_eq!(report.steps_taken, 3);

    let last = report.history.last().expect("history");
    assert!(last.was_loop_recovery());
    assert_eq!(
        last.discarded.as_ref().map(|c| c.action.clone()),
        Some(Action::Tap {
            at: Point::new(200, 200)
        })
    );
}

#[test]
fn step_budget_exhaustion_fails() {
    let config = AgentConfig {
        max_steps: 5,
        ..AgentConfig::default()
    };
    let device = ScriptedDevice::ever_changing();

    let report = TaskRunner::new(coordinator(config, offline_chain(), device))
        .with_completion(Box::new(NeverComplete))
        .run();

    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.reason, STEP_BUDGET_EXHAUSTED);
    assert_eq!(report.cause, Some(TerminationCause::StepBudgetExhausted));
    assert_eq!(report.steps_taken, 5);
    assert_eq!(report.history.len(), 5);
}

#[test]
fn report_history_is_trimmed() {
    let config = AgentConfig {
        max_steps: 8,
        report_history_len: 3,
        ..AgentConfig::default()
    };
    let device = ScriptedDevice::ever_changing();

    let report = TaskRunner::new(coordinator(config, offline_chain(), device))
        .with_completion(Box::new(NeverComplete))
        .run();

    assert_eq!(report.history.len(), 3);
    assert_eq!(report.history[2].step_index, 8);
    assert!(report.history.iter().all(|e| e.after.is_some()));
}

#[test]
fn exhausted_device_retries_fail_the_run() {
    let config = AgentConfig::default();
    let device = ScriptedDevice::ever_changing().failing_executions(3);

    let report = TaskRunner::new(coordinator(config, offline_chain(), device)).run();

    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.cause, Some(TerminationCause::DeviceExecutionFault));
    assert!(report.reason.starts_with("device execution fault"));
    assert_eq!(report.steps_taken, 0);
    assert_eq!(report.history.len(), 1);
}

#[test]
fn initial_capture_failure_fails_before_any_step() {
    let config = AgentConfig::default();
    let device = ScriptedDevice::fixed(screens::blank()).failing_captures(3);
    let executed = device.executed();

    let report = TaskRunner::new(coordinator(config, offline_chain(), device)).run();

    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.cause, Some(TerminationCause::DeviceCaptureFault));
    assert!(executed.borrow().is_empty());
}

#[test]
fn transient_capture_failure_is_retried() {
    let config = AgentConfig {
        max_steps: 2,
        ..AgentConfig::default()
    };
    let device = ScriptedDevice::ever_changing().failing_captures(2);

    let report = TaskRunner::new(coordinator(config, offline_chain(), device))
        .with_completion(Box::new(NeverComplete))
        .run();

    assert_eq!(report.cause, Some(TerminationCause::StepBudgetExhausted));
}

#[test]
fn persistent_service_faults_escalate() {
    let config = AgentConfig::default();
    let device = ScriptedDevice::ever_changing();

    let report = TaskRunner::new(coordinator(
        config.clone(),
        chain(ScriptedInference::unavailable(), &config),
        device,
    ))
    .with_completion(Box::new(NeverComplete))
    .run();

    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.cause, Some(TerminationCause::ServiceUnavailable));
    assert_eq!(report.steps_taken, config.max_consecutive_service_faults + 1);
}

#[test]
fn a_successful_reply_resets_service_faults() {
    let config = AgentConfig {
        max_steps: 6,
        ..AgentConfig::default()
    };
    let inference = ScriptedInference::script(vec![
        Reply::Timeout,
        Reply::Timeout,
        Reply::Timeout,
        Reply::Text("SCROLL down".into()),
        Reply::Timeout,
    ]);
    let device = ScriptedDevice::ever_changing();

    let report = TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device))
        .with_completion(Box::new(NeverComplete))
        .run();

    assert_eq!(report.cause, Some(TerminationCause::StepBudgetExhausted));
}

#[test]
fn unusable_screenshots_do_not_escalate() {
    let config = AgentConfig {
        max_steps: 6,
        ..AgentConfig::default()
    };
    let inference = ScriptedInference::script(vec![Reply::BadImage]);
    let device = ScriptedDevice::ever_changing();

    let report = TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device))
        .with_completion(Box::new(NeverComplete))
        .run();

    assert_eq!(report.cause, Some(TerminationCause::StepBudgetExhausted));
    assert_eq!(report.steps_taken, 6);
}

#[test]
fn unusable_screenshot_falls_through_without_a_fault() {
    let config = AgentConfig::default();
    let inference = ScriptedInference::script(vec![Reply::BadImage]);
    let mut device = ScriptedDevice::fixed(screens::search_home());
    let (mut state, snapshot) = running_state(&mut device);

    let mut coordinator = coordinator(config.clone(), chain(inference, &config), device);
    let entry = coordinator.decide_and_execute(&mut state, &snapshot);

    assert_eq!(entry.provenance, Provenance::Structural);
    assert_eq!(state.consecutive_service_faults(), 0);
}

#[test]
fn cancellation_aborts_at_step_boundary() {
    let config = AgentConfig::default();
    let device = ScriptedDevice::ever_changing();
    let executed = device.executed();

    let token = CancellationToken::new();
    token.cancel();

    let report = TaskRunner::new(coordinator(config, offline_chain(), device))
        .with_cancellation(token)
        .run();

    assert_eq!(report.status, TaskStatus::Aborted);
    assert_eq!(report.reason, CANCELLED);
    assert!(executed.borrow().is_empty());
}

#[test]
fn prompts_carry_step_progress_and_frame() {
    let config = AgentConfig {
        max_steps: 2,
        ..AgentConfig::default()
    };
    let inference = ScriptedInference::repeating("SCROLL down");
    let prompts = inference.prompts();
    let device = ScriptedDevice::ever_changing();

    TaskRunner::new(coordinator(config.clone(), chain(inference, &config), device))
        .with_completion(Box::new(NeverComplete))
        .run();

    let prompts = prompts.borrow();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Task: search for shoes on flipkart"));
    assert!(prompts[0].contains("Step: 1/2"));
    assert!(prompts[0].contains("512x1024"));
    assert!(prompts[0].contains("search_initiated: pending"));
    assert!(prompts[1].contains("Step: 2/2"));
    assert!(prompts[1].contains("step 1: scroll(down,medium)"));
}

#[test]
fn console_report_names_status_and_reason() {
    let config = AgentConfig {
        max_steps: 2,
        ..AgentConfig::default()
    };
    let report = TaskRunner::new(coordinator(config, offline_chain(), ScriptedDevice::ever_changing()))
        .with_completion(Box::new(NeverComplete))
        .run();

    let text = format_console_report(&report);
    assert!(text.contains("FAILED after 2 steps"));
    assert!(text.contains("reason: step budget exhausted"));
    assert!(text.contains("[x] search_initiated"));
    assert!(text.contains("[ ] query_entered"));
}
