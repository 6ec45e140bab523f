use std::collections::VecDeque;

use crate::screen::fingerprint::ScreenFingerprint;

pub const DEFAULT_WINDOW: usize = 10;
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Bounded memory of executed action signatures and the screens they were
/// executed on. One instance per run.
#[derive(Debug, Clone)]
pub struct LoopDetector {
    window: usize,
    threshold: u32,

    signatures: VecDeque<String>,
    fingerprints: VecDeque<ScreenFingerprint>,

    /// Consecutive repeats of the last signature on an unchanged screen,
    /// not counting its first occurrence.
    repeated_action_count: u32,

    /// Consecutive records on the same screen, not counting the first.
    repeated_screen_count: u32,

    /// Loop recoveries issued since the run last reached a new screen.
    recoveries_without_progress: u32,
}

impl LoopDetector {
    pub fn new(window: usize, threshold: u32) -> Self {
        Self {
            window: window.max(1),
            threshold: threshold.max(1),
            signatures: VecDeque::new(),
            fingerprints: VecDeque::new(),
            repeated_action_count: 0,
            repeated_screen_count: 0,
            recoveries_without_progress: 0,
        }
    }

    /// Would executing `signature` on `current` continue a repetition loop?
    ///
    /// True on the N-th identical check when the previous N-1 recorded
    /// actions carried the same signature on the same screen. Also true when
    /// the run left `current` and came back, and `signature` was already
    /// executed on it N-1 times within the window.
    pub fn check(&self, signature: &str, current: &ScreenFingerprint) -> bool {
        let (Some(last_sig), Some(last_fp)) = (self.signatures.back(), self.fingerprints.back())
        else {
            return self.threshold <= 1;
        };

        if last_fp != current {
            // revisited screen: count earlier executions of the same action on it
            let earlier = self.executions_on(signature, current);
            return earlier > 0 && earlier + 1 >= self.threshold;
        }

        if last_sig != signature {
            return self.threshold <= 1;
        }

        // run length including the candidate itself
        let run = self.repeated_action_count + 2;
        run >= self.threshold
    }

    /// Times `signature` was recorded on `fingerprint` within the window.
    pub fn executions_on(&self, signature: &str, fingerprint: &ScreenFingerprint) -> u32 {
        self.signatures
            .iter()
            .zip(&self.fingerprints)
            .filter(|(sig, fp)| sig.as_str() == signature && *fp == fingerprint)
            .count() as u32
    }

    /// Whether `fingerprint` was recorded anywhere within the window.
    pub fn has_seen(&self, fingerprint: &ScreenFingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Update the window after an action was executed on `fingerprint`.
    pub fn record(&mut self, signature: &str, fingerprint: &ScreenFingerprint) {
        let same_screen = self.fingerprints.back() == Some(fingerprint);
        let same_action = self.signatures.back().map(String::as_str) == Some(signature);

        self.repeated_screen_count = if same_screen {
            self.repeated_screen_count + 1
        } else {
            0
        };

        self.repeated_action_count = if same_screen && same_action {
            self.repeated_action_count + 1
        } else {
            0
        };

        if self.signatures.len() == self.window {
            self.signatures.pop_front();
            self.fingerprints.pop_front();
        }
        self.signatures.push_back(signature.to_string());
        self.fingerprints.push_back(fingerprint.clone());
    }

    /// Note that a loop-recovery action replaced a looping candidate.
    pub fn note_recovery(&mut self) {
        self.recoveries_without_progress += 1;
    }

    /// Reaching a screen not seen within the window clears pending
    /// recoveries. Returning to a known screen is not progress.
    pub fn observe_screen(&mut self, fingerprint: &ScreenFingerprint) {
        if !self.has_seen(fingerprint) {
            self.recoveries_without_progress = 0;
        }
    }

    pub fn recoveries_without_progress(&self) -> u32 {
        self.recoveries_without_progress
    }

    pub fn repeated_action_count(&self) -> u32 {
        self.repeated_action_count
    }

    pub fn repeated_screen_count(&self) -> u32 {
        self.repeated_screen_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_THRESHOLD)
    }
}
