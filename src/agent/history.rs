use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    agent::agent_model::{ActionCandidate, Provenance},
    screen::fingerprint::ScreenFingerprint,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Executed { attempts: u32 },
    Faulted { attempts: u32, error: String },
}

impl ExecutionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, ExecutionOutcome::Executed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionHistoryEntry {
    pub step_index: u32,
    pub candidate: ActionCandidate,
    pub provenance: Provenance,
    pub before: ScreenFingerprint,
    pub after: Option<ScreenFingerprint>,

    /// Candidate thrown away by the loop check in favour of `candidate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discarded: Option<ActionCandidate>,

    pub outcome: ExecutionOutcome,
}

impl ActionHistoryEntry {
    pub fn was_loop_recovery(&self) -> bool {
        self.discarded.is_some()
    }

    /// One-line summary for prompts and console output.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "step {}: {} [{}]",
            self.step_index,
            self.candidate.describe(),
            self.provenance
        );
        if self.after.as_ref() == Some(&self.before) {
            line.push_str(" (screen unchanged)");
        }
        if let ExecutionOutcome::Faulted { error, .. } = &self.outcome {
            line.push_str(&format!(" (failed: {})", error));
        }
        line
    }
}

/// Append-only window of the most recent entries; oldest are evicted.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    capacity: usize,
    entries: VecDeque<ActionHistoryEntry>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, entry: ActionHistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_mut(&mut self) -> Option<&mut ActionHistoryEntry> {
        self.entries.back_mut()
    }

    /// The `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ActionHistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActionHistoryEntry> {
        self.entries.iter()
    }
}
