use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    agent::{
        error::AgentResult, history::ActionHistoryEntry, task::Task,
        task_state::TaskExecutionState,
    },
    screen::screen_model::{Resolution, ScreenSnapshot},
};

pub const STRUCTURED_CONFIDENCE: f32 = 0.9;
pub const LOOSE_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_WAIT_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollExtent {
    Short,
    Medium,
    Long,
}

impl ScrollExtent {
    /// Share of the screen height covered by the swipe.
    pub fn fraction(&self) -> f64 {
        match self {
            ScrollExtent::Short => 0.25,
            ScrollExtent::Medium => 0.4,
            ScrollExtent::Long => 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Tap {
        at: Point,
    },
    TypeText {
        target: Option<Point>,
        text: String,
    },
    Scroll {
        direction: ScrollDirection,
        extent: ScrollExtent,
    },
    GoBack,
    Wait {
        millis: u64,
    },
}

impl Action {
    /// Comparable identity used by loop detection.
    pub fn signature(&self) -> String {
        match self {
            Action::Tap { at } => format!("tap({},{})", at.x, at.y),
            Action::TypeText { target, text } => match target {
                Some(p) => format!("type({},{},{:?})", p.x, p.y, text),
                None => format!("type({:?})", text),
            },
            Action::Scroll { direction, extent } => {
                format!("scroll({:?},{:?})", direction, extent).to_lowercase()
            }
            Action::GoBack => "go_back".to_string(),
            Action::Wait { .. } => "wait".to_string(),
        }
    }

    pub fn is_text_entry(&self) -> bool {
        matches!(self, Action::TypeText { .. })
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Inference,
    Structural,
    LastResort,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provenance::Inference => "inference",
            Provenance::Structural => "structural",
            Provenance::LastResort => "last_resort",
        };
        f.write_str(name)
    }
}

/// Frame in which a candidate's coordinates are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "space", content = "frame", rename_all = "snake_case")]
pub enum CoordinateSpace {
    Device,
    Reference(Resolution),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub action: Action,
    pub provenance: Provenance,
    pub confidence: Option<f32>,
    pub space: CoordinateSpace,

    /// Free-text note attached by the proposer ("Search bar", element label).
    pub label: Option<String>,

    /// Inference declared the task done; executed as a wait.
    #[serde(default)]
    pub completes_task: Option<String>,
}

impl ActionCandidate {
    pub fn new(action: Action, provenance: Provenance) -> Self {
        Self {
            action,
            provenance,
            confidence: None,
            space: CoordinateSpace::Device,
            label: None,
            completes_task: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn in_reference_frame(mut self, frame: Resolution) -> Self {
        self.space = CoordinateSpace::Reference(frame);
        self
    }

    pub fn signature(&self) -> String {
        self.action.signature()
    }

    /// Signature plus label, used for milestone keyword matching.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{} # {}", self.signature(), label),
            None => self.signature(),
        }
    }
}

/// Everything a strategy may look at when proposing the next action.
pub struct StrategyContext<'a> {
    pub task: &'a Task,
    pub state: &'a TaskExecutionState,
    pub snapshot: &'a ScreenSnapshot,
    pub recent: &'a [ActionHistoryEntry],
    pub max_steps: u32,
}

/// One link of the proposal chain.
///
/// `Ok(None)` means "no candidate" and hands over to the next strategy. An
/// `Err` is a service fault; the coordinator treats it like `Ok(None)` but
/// counts it.
pub trait Strategy {
    fn provenance(&self) -> Provenance;

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> AgentResult<Option<ActionCandidate>>;
}
