use crate::agent::{
    agent_model::{Action, ActionCandidate, Provenance, ScrollDirection, ScrollExtent, Strategy, StrategyContext},
    error::AgentResult,
};

/// Fixed table keyed by progress: the pending milestone's fallback move, or
/// the plan's final move once everything is achieved. Always proposes.
#[derive(Debug, Default)]
pub struct LastResortStrategy;

impl Strategy for LastResortStrategy {
    fn provenance(&self) -> Provenance {
        Provenance::LastResort
    }

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> AgentResult<Option<ActionCandidate>> {
        let progress = ctx.state.progress();
        let movement = progress.current_last_resort();
        let res = ctx.snapshot.resolution;

        let label = match progress.next_pending() {
            Some(m) => format!("fallback for {}", m.name),
            None => "fallback".to_string(),
        };

        Ok(Some(
            ActionCandidate::new(movement.to_action(res.width, res.height), Provenance::LastResort)
                .with_label(label),
        ))
    }
}

/// Action substituted for a candidate the loop detector rejected. Always
/// differs from the rejected action.
pub fn recovery_candidate(rejected: &ActionCandidate) -> ActionCandidate {
    let action = match rejected.action {
        Action::Scroll { .. } => Action::GoBack,
        Action::GoBack => Action::Scroll {
            direction: ScrollDirection::Down,
            extent: ScrollExtent::Medium,
        },
        Action::Tap { .. } | Action::TypeText { .. } | Action::Wait { .. } => Action::Scroll {
            direction: ScrollDirection::Down,
            extent: ScrollExtent::Medium,
        },
    };

    ActionCandidate::new(action, Provenance::LastResort).with_label("loop recovery")
}

/// Used when a configured chain has no strategy that always answers.
pub fn default_candidate() -> ActionCandidate {
    ActionCandidate::new(Action::GoBack, Provenance::LastResort).with_label("no proposal")
}
