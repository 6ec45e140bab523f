use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::error::{AgentError, AgentResult};

/// Scalar knobs consumed by the decision loop. Every field has a default so
/// a partial YAML section is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub repetition_threshold: u32,
    pub history_window: usize,

    /// Loop recoveries tolerated without reaching a new screen before ABORTED_LOOP.
    pub max_loop_recoveries: u32,

    pub inference_min_confidence: f32,
    pub structural_min_confidence: f32,

    pub inference_timeout_secs: u64,
    pub device_timeout_secs: u64,
    pub device_retry_count: u32,

    /// Consecutive steps with a service fault tolerated before FAILED.
    pub max_consecutive_service_faults: u32,

    pub prompt_history_len: usize,
    pub reference_max_dimension: u32,
    pub report_history_len: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            repetition_threshold: 2,
            history_window: 10,
            max_loop_recoveries: 0,
            inference_min_confidence: 0.5,
            structural_min_confidence: 0.3,
            inference_timeout_secs: 35,
            device_timeout_secs: 15,
            device_retry_count: 2,
            max_consecutive_service_faults: 3,
            prompt_history_len: 4,
            reference_max_dimension: 1024,
            report_history_len: 5,
        }
    }
}

impl AgentConfig {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs)
    }

    pub fn validate(&self) -> AgentResult<()> {
        let fail = |msg: String| -> AgentResult<()> { Err(AgentError::Config(msg)) };

        if !(1..=50).contains(&self.max_steps) {
            return fail(format!("max_steps must be within 1..=50, got {}", self.max_steps));
        }
        if self.repetition_threshold < 2 {
            return fail(format!(
                "repetition_threshold must be at least 2, got {}",
                self.repetition_threshold
            ));
        }
        if self.history_window < self.repetition_threshold as usize {
            return fail(format!(
                "history_window ({}) must not be smaller than repetition_threshold ({})",
                self.history_window, self.repetition_threshold
            ));
        }
        for (name, value) in [
            ("inference_min_confidence", self.inference_min_confidence),
            ("structural_min_confidence", self.structural_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.inference_timeout_secs == 0 || self.device_timeout_secs == 0 {
            return fail("timeouts must be positive".to_string());
        }
        if self.reference_max_dimension == 0 {
            return fail("reference_max_dimension must be positive".to_string());
        }
        Ok(())
    }
}
