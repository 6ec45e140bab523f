use serde::{Deserialize, Serialize};

use crate::agent::agent_model::{Action, ActionCandidate, Point, ScrollDirection, ScrollExtent};

/// What kind of element a pending milestone is looking for. Drives the
/// structural strategy's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    Submit,
    Cart,
    Browse,
}

impl Intent {
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            Intent::Search => &["search", "find", "query", "magnif", "glass"],
            Intent::Submit => &["submit", "go", "done", "apply", "continue", "next"],
            Intent::Cart => &["cart", "add to", "buy", "basket", "bag"],
            Intent::Browse => &["result", "product", "filter", "sort", "item"],
        }
    }

    /// Class-name fragments of elements that usually serve this intent.
    pub fn roles(&self) -> &'static [&'static str] {
        match self {
            Intent::Search => &["edittext", "searchview", "autocompletetextview", "imagebutton"],
            Intent::Submit | Intent::Cart => &["button", "imagebutton"],
            Intent::Browse => &["viewgroup", "recyclerview", "textview"],
        }
    }

    /// Search affordances sit near the top of most apps.
    pub fn prefers_upper_screen(&self) -> bool {
        matches!(self, Intent::Search)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MilestoneTrigger {
    /// A tap whose description contains any of the keywords.
    TapMatching { keywords: Vec<String> },
    TextEntered,
    CompletionClaimed,
}

impl MilestoneTrigger {
    pub fn matches(&self, candidate: &ActionCandidate) -> bool {
        match self {
            MilestoneTrigger::TapMatching { keywords } => {
                matches!(candidate.action, Action::Tap { .. }) && {
                    let described = candidate.describe().to_lowercase();
                    keywords.iter().any(|k| described.contains(k.as_str()))
                }
            }
            MilestoneTrigger::TextEntered => candidate.action.is_text_entry(),
            MilestoneTrigger::CompletionClaimed => candidate.completes_task.is_some(),
        }
    }
}

/// Fixed fallback move for when no strategy has anything better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LastResortMove {
    /// Tap at a position given as fractions of the screen size.
    TapRelative { x: f64, y: f64 },
    Scroll { direction: ScrollDirection },
    GoBack,
}

impl LastResortMove {
    pub fn to_action(&self, width: u32, height: u32) -> Action {
        match self {
            LastResortMove::TapRelative { x, y } => Action::Tap {
                at: Point::new(
                    (width as f64 * x).round() as i32,
                    (height as f64 * y).round() as i32,
                ),
            },
            LastResortMove::Scroll { direction } => Action::Scroll {
                direction: *direction,
                extent: ScrollExtent::Medium,
            },
            LastResortMove::GoBack => Action::GoBack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneSpec {
    pub name: String,
    pub trigger: MilestoneTrigger,
    pub intent: Intent,
    pub last_resort: LastResortMove,
}

/// Ordered task-specific sub-goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestonePlan {
    pub milestones: Vec<MilestoneSpec>,

    /// Intent and move used once every milestone is achieved.
    pub final_intent: Intent,
    pub final_move: LastResortMove,
}

impl Default for MilestonePlan {
    /// Search-then-query plan for shopping-style tasks.
    fn default() -> Self {
        Self {
            milestones: vec![
                MilestoneSpec {
                    name: "search_initiated".into(),
                    trigger: MilestoneTrigger::TapMatching {
                        keywords: ["search", "input", "field", "box", "bar"]
                            .into_iter()
                            .map(String::from)
                            .collect(),
                    },
                    intent: Intent::Search,
                    last_resort: LastResortMove::TapRelative { x: 0.5, y: 0.08 },
                },
                MilestoneSpec {
                    name: "query_entered".into(),
                    trigger: MilestoneTrigger::TextEntered,
                    intent: Intent::Search,
                    last_resort: LastResortMove::Scroll {
                        direction: ScrollDirection::Down,
                    },
                },
            ],
            final_intent: Intent::Browse,
            final_move: LastResortMove::GoBack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneStatus {
    pub name: String,
    pub achieved: bool,
}

/// Progress flags, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressFlags {
    plan: MilestonePlan,
    achieved: Vec<bool>,
}

impl ProgressFlags {
    pub fn new(plan: MilestonePlan) -> Self {
        let achieved = vec![false; plan.milestones.len()];
        Self { plan, achieved }
    }

    pub fn plan(&self) -> &MilestonePlan {
        &self.plan
    }

    pub fn is_achieved(&self, name: &str) -> bool {
        self.plan
            .milestones
            .iter()
            .zip(&self.achieved)
            .any(|(m, done)| m.name == name && *done)
    }

    pub fn all_achieved(&self) -> bool {
        self.achieved.iter().all(|d| *d)
    }

    /// First milestone not yet achieved.
    pub fn next_pending(&self) -> Option<&MilestoneSpec> {
        self.plan
            .milestones
            .iter()
            .zip(&self.achieved)
            .find(|(_, done)| !**done)
            .map(|(m, _)| m)
    }

    pub fn current_intent(&self) -> Intent {
        self.next_pending()
            .map(|m| m.intent)
            .unwrap_or(self.plan.final_intent)
    }

    pub fn current_last_resort(&self) -> LastResortMove {
        self.next_pending()
            .map(|m| m.last_resort)
            .unwrap_or(self.plan.final_move)
    }

    /// Mark every milestone the executed candidate satisfies. Returns the
    /// names newly achieved.
    pub fn apply(&mut self, candidate: &ActionCandidate) -> Vec<String> {
        let mut newly = Vec::new();
        for (spec, done) in self.plan.milestones.iter().zip(self.achieved.iter_mut()) {
            if !*done && spec.trigger.matches(candidate) {
                *done = true;
                newly.push(spec.name.clone());
            }
        }
        newly
    }

    pub fn statuses(&self) -> Vec<MilestoneStatus> {
        self.plan
            .milestones
            .iter()
            .zip(&self.achieved)
            .map(|(m, done)| MilestoneStatus {
                name: m.name.clone(),
                achieved: *done,
            })
            .collect()
    }
}
