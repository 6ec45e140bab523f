use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::agent::{
    history::{ActionHistoryEntry, ExecutionOutcome},
    task_state::TaskStatus,
};

/// One line of the JSONL step trace.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub step: u32,

    pub status: String,

    pub provenance: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,

    pub confidence: Option<f32>,
    pub suppression_reason: Option<String>,

    pub outcome: Option<String>,
    pub milestones: Vec<String>,
}

impl TraceEvent {
    pub fn now(step: u32, status: TaskStatus) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            step,
            status: status.to_string(),
            provenance: None,
            action: None,
            label: None,
            confidence: None,
            suppression_reason: None,
            outcome: None,
            milestones: vec![],
        }
    }

    /// Fill action fields from a history entry.
    pub fn with_entry(mut self, entry: &ActionHistoryEntry) -> Self {
        self.provenance = Some(entry.provenance.to_string());
        self.action = Some(entry.candidate.signature());
        self.label = entry.candidate.label.clone();
        self.confidence = entry.candidate.confidence;
        if let Some(discarded) = &entry.discarded {
            self.suppression_reason = Some(format!("loop: {}", discarded.signature()));
        }
        self.outcome = Some(match &entry.outcome {
            ExecutionOutcome::Executed { attempts } => format!("executed ({} attempts)", attempts),
            ExecutionOutcome::Faulted { error, .. } => format!("faulted: {}", error),
        });
        self
    }

    pub fn with_milestones(mut self, milestones: &[String]) -> Self {
        self.milestones = milestones.to_vec();
        self
    }

    pub fn with_suppression(mut self, reason: impl ToString) -> Self {
        self.suppression_reason = Some(reason.to_string());
        self
    }
}
