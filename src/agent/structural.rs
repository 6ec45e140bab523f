use tracing::debug;

use crate::{
    agent::{
        agent_model::{Action, ActionCandidate, Point, Provenance, Strategy, StrategyContext},
        error::AgentResult,
        milestone::{Intent, MilestoneTrigger},
    },
    screen::screen_model::{Resolution, StructuralTree, UiElement},
};

// ============================================================================
// Scoring weights
// ============================================================================

pub const KEYWORD_WEIGHT: f32 = 5.0;
pub const ROLE_WEIGHT: f32 = 3.0;
pub const POSITION_WEIGHT: f32 = 1.0;
pub const SIZE_WEIGHT: f32 = 1.0;
pub const MAX_SCORE: f32 = KEYWORD_WEIGHT + ROLE_WEIGHT + POSITION_WEIGHT + SIZE_WEIGHT;

/// Elements scoring at or below this are never proposed.
pub const SCORE_FLOOR: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct ScoredElement<'a> {
    pub element: &'a UiElement,
    pub score: f32,
}

/// Score one element for an intent. Non-interactable or bounds-less
/// elements score zero.
pub fn score_element(el: &UiElement, intent: Intent, resolution: Resolution) -> f32 {
    let Some(bounds) = el.bounds else {
        return 0.0;
    };
    if !el.is_interactable() || bounds.width() <= 0 || bounds.height() <= 0 {
        return 0.0;
    }

    let mut score = 0.0;

    // ---- Keyword match (high) ----
    let text = el.searchable_text();
    if intent.vocabulary().iter().any(|k| text.contains(k)) {
        score += KEYWORD_WEIGHT;
    }

    // ---- Role match (medium) ----
    let class = el.class.to_lowercase();
    if intent.roles().iter().any(|r| class.ends_with(r)) {
        score += ROLE_WEIGHT;
    }

    // ---- Position bias (low) ----
    if intent.prefers_upper_screen() && resolution.height > 0 {
        let (_, cy) = bounds.center();
        let relative = (cy.max(0) as f32 / resolution.height as f32).min(1.0);
        score += POSITION_WEIGHT * (1.0 - relative);
    }

    // ---- Size: skip tiny targets ----
    if bounds.width() > 200 && bounds.height() > 30 {
        score += SIZE_WEIGHT;
    }

    score
}

/// All elements above the floor, best first. Ties keep document order.
pub fn rank_elements(tree: &StructuralTree, intent: Intent, resolution: Resolution) -> Vec<ScoredElement<'_>> {
    let mut scored: Vec<ScoredElement<'_>> = tree
        .elements()
        .into_iter()
        .map(|element| ScoredElement {
            element,
            score: score_element(element, intent, resolution),
        })
        .filter(|s| s.score > SCORE_FLOOR)
        .collect();

    // stable sort keeps document order for equal scores
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

/// Proposes a tap (or text entry) on the best-scoring element of the
/// structural tree.
#[derive(Debug, Default)]
pub struct StructuralStrategy;

impl StructuralStrategy {
    fn wants_text_entry(ctx: &StrategyContext<'_>) -> bool {
        ctx.state
            .progress()
            .next_pending()
            .is_some_and(|m| m.trigger == MilestoneTrigger::TextEntered)
    }
}

impl Strategy for StructuralStrategy {
    fn provenance(&self) -> Provenance {
        Provenance::Structural
    }

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> AgentResult<Option<ActionCandidate>> {
        let intent = ctx.state.progress().current_intent();
        let resolution = ctx.snapshot.resolution;
        let ranked = rank_elements(&ctx.snapshot.tree, intent, resolution);

        let Some(best) = ranked.first() else {
            debug!(?intent, "no structural element above floor");
            return Ok(None);
        };

        // rank_elements only keeps elements with bounds
        let Some(bounds) = best.element.bounds else {
            return Ok(None);
        };
        let (x, y) = bounds.center();
        let at = Point::new(x, y);

        let action = match ctx.task.query_text() {
            Some(query) if best.element.is_input() && Self::wants_text_entry(ctx) => {
                Action::TypeText {
                    target: Some(at),
                    text: query,
                }
            }
            _ => Action::Tap { at },
        };

        let label = best.element.label().unwrap_or("interactive element");
        let confidence = (best.score / MAX_SCORE).min(1.0);

        debug!(score = best.score, confidence, label, "structural candidate");

        Ok(Some(
            ActionCandidate::new(action, Provenance::Structural)
                .with_confidence(confidence)
                .with_label(label.chars().take(40).collect::<String>()),
        ))
    }
}
