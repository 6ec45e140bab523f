use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::{
    agent::agent_model::{Action, DEFAULT_WAIT_MS, Point, ScrollDirection, ScrollExtent},
    screen::screen_model::Resolution,
};

// ============================================================================
// Reply model
// ============================================================================

/// Action extracted from a reply, coordinates still in the reference frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyAction {
    Act { action: Action, note: Option<String> },
    Complete { summary: String },
}

/// How a free-form reply was understood.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// Matched the response grammar exactly.
    Structured(ReplyAction),
    /// Found an action pattern somewhere in otherwise free text.
    LooseMatch(ReplyAction),
    Unparseable,
}

// ============================================================================
// Patterns
// ============================================================================

static TAP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^TAP\s*\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)\s*(?:#\s*(.*))?$").expect("static regex")
});
static TYPE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^TYPE\s*['"]([^'"]+)['"]\s*(?:#\s*(.*))?$"#).expect("static regex")
});
static SCROLL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^SCROLL\s+(up|down)\s*(?:#\s*(.*))?$").expect("static regex")
});
static BACK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:BACK|GO_BACK)\s*(?:#\s*(.*))?$").expect("static regex"));
static WAIT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^WAIT\s*(?:#\s*(.*))?$").expect("static regex"));
static COMPLETE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^TASK_COMPLETE\s*:?\s*(.*)$").expect("static regex"));

static TAP_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)TAP\s*\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)").expect("static regex")
});
static TYPE_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)TYPE\s*['"]([^'"]+)['"]"#).expect("static regex"));
static SCROLL_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSCROLL\b(?:\s+(up|down)\b)?").expect("static regex"));
static TAP_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:tap|click|press)\b").expect("static regex"));
static COMPLETE_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TASK_COMPLETE\s*:?\s*([^\n]*)").expect("static regex"));
static COORDS_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*(\d+)\s*,\s*(\d+)\s*\)").expect("static regex"));
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

#[derive(Debug, Deserialize)]
struct JsonReply {
    action: String,
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a reply. Rules are tried in order: JSON object, exact grammar line,
/// then loose patterns over the full text. Any tap outside `frame` makes the
/// reply unparseable.
pub fn parse_reply(reply: &str, frame: Resolution) -> ParsedReply {
    let parsed = parse_json(reply)
        .map(ParsedReply::Structured)
        .or_else(|| parse_lines(reply).map(ParsedReply::Structured))
        .or_else(|| parse_loose(reply).map(ParsedReply::LooseMatch))
        .unwrap_or(ParsedReply::Unparseable);

    let in_frame = match &parsed {
        ParsedReply::Structured(action) | ParsedReply::LooseMatch(action) => {
            within_frame(action, frame)
        }
        ParsedReply::Unparseable => true,
    };

    if in_frame { parsed } else { ParsedReply::Unparseable }
}

fn within_frame(reply: &ReplyAction, frame: Resolution) -> bool {
    match reply {
        ReplyAction::Act {
            action: Action::Tap { at },
            ..
        } => frame.contains(at.x, at.y),
        ReplyAction::Act {
            action: Action::TypeText {
                target: Some(at), ..
            },
            ..
        } => frame.contains(at.x, at.y),
        _ => true,
    }
}

fn parse_json(reply: &str) -> Option<ReplyAction> {
    let raw = JSON_OBJECT.find(reply)?.as_str();
    let parsed: JsonReply = serde_json::from_str(raw).ok()?;

    let note = parsed.note.clone();
    let action = match parsed.action.to_lowercase().as_str() {
        "tap" | "click" => Action::Tap {
            at: Point::new(parsed.x?, parsed.y?),
        },
        "type" | "type_text" => Action::TypeText {
            target: parsed.x.zip(parsed.y).map(|(x, y)| Point::new(x, y)),
            text: parsed.text.filter(|t| !t.is_empty())?,
        },
        "scroll" => Action::Scroll {
            direction: direction_from(parsed.direction.as_deref()),
            extent: ScrollExtent::Medium,
        },
        "back" | "go_back" => Action::GoBack,
        "wait" => Action::Wait {
            millis: DEFAULT_WAIT_MS,
        },
        "complete" | "task_complete" => {
            return Some(ReplyAction::Complete {
                summary: parsed
                    .summary
                    .or(parsed.note)
                    .unwrap_or_else(|| "task complete".into()),
            });
        }
        _ => return None,
    };

    Some(ReplyAction::Act { action, note })
}

/// Lines that are blank, headings or code fences carry no action.
fn is_noise(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with("```")
}

fn note_from(m: Option<regex::Match<'_>>) -> Option<String> {
    m.map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_lines(reply: &str) -> Option<ReplyAction> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !is_noise(line))
        .find_map(parse_line)
}

fn parse_line(line: &str) -> Option<ReplyAction> {
    if let Some(c) = TAP_LINE.captures(line) {
        return Some(ReplyAction::Act {
            action: Action::Tap {
                at: Point::new(c[1].parse().ok()?, c[2].parse().ok()?),
            },
            note: note_from(c.get(3)),
        });
    }
    if let Some(c) = TYPE_LINE.captures(line) {
        return Some(ReplyAction::Act {
            action: Action::TypeText {
                target: None,
                text: c[1].to_string(),
            },
            note: note_from(c.get(2)),
        });
    }
    if let Some(c) = SCROLL_LINE.captures(line) {
        return Some(ReplyAction::Act {
            action: Action::Scroll {
                direction: direction_from(Some(&c[1])),
                extent: ScrollExtent::Medium,
            },
            note: note_from(c.get(2)),
        });
    }
    if let Some(c) = BACK_LINE.captures(line) {
        return Some(ReplyAction::Act {
            action: Action::GoBack,
            note: note_from(c.get(1)),
        });
    }
    if let Some(c) = WAIT_LINE.captures(line) {
        return Some(ReplyAction::Act {
            action: Action::Wait {
                millis: DEFAULT_WAIT_MS,
            },
            note: note_from(c.get(1)),
        });
    }
    if let Some(c) = COMPLETE_LINE.captures(line) {
        let summary = c[1].trim();
        return Some(ReplyAction::Complete {
            summary: if summary.is_empty() {
                "task complete".into()
            } else {
                summary.to_string()
            },
        });
    }
    None
}

fn parse_loose(reply: &str) -> Option<ReplyAction> {
    if let Some(c) = TAP_ANY.captures(reply) {
        return Some(ReplyAction::Act {
            action: Action::Tap {
                at: Point::new(c[1].parse().ok()?, c[2].parse().ok()?),
            },
            note: None,
        });
    }
    if let Some(c) = TYPE_ANY.captures(reply) {
        return Some(ReplyAction::Act {
            action: Action::TypeText {
                target: None,
                text: c[1].to_string(),
            },
            note: None,
        });
    }
    if let Some(c) = COMPLETE_ANY.captures(reply) {
        let summary = c[1].trim();
        return Some(ReplyAction::Complete {
            summary: if summary.is_empty() {
                "task complete".into()
            } else {
                summary.to_string()
            },
        });
    }

    // bare coordinates next to a tap-like verb outrank a scroll mention
    if TAP_VERB.is_match(reply) {
        if let Some(c) = COORDS_ANY.captures(reply) {
            return Some(ReplyAction::Act {
                action: Action::Tap {
                    at: Point::new(c[1].parse().ok()?, c[2].parse().ok()?),
                },
                note: None,
            });
        }
    }

    if let Some(c) = SCROLL_ANY.captures(reply) {
        return Some(ReplyAction::Act {
            action: Action::Scroll {
                direction: direction_from(c.get(1).map(|m| m.as_str())),
                extent: ScrollExtent::Medium,
            },
            note: None,
        });
    }

    None
}

fn direction_from(raw: Option<&str>) -> ScrollDirection {
    match raw.map(str::to_lowercase).as_deref() {
        Some("up") => ScrollDirection::Up,
        _ => ScrollDirection::Down,
    }
}
