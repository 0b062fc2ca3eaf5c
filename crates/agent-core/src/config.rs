//! Configuration for the agent loop.

use serde::{Deserialize, Serialize};

/// Tunables for one agent run. Passed in explicitly; there are no global
/// mutable defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum loop iterations before the run is declared exhausted.
    /// Default: 50
    pub max_steps: u32,

    /// Maximum actions executed per planning call.
    /// Default: 3
    pub max_actions_per_step: u32,

    /// Consecutive failed steps before the loop aborts.
    /// Default: 3
    pub max_consecutive_failures: u32,

    /// Capture screenshots and attach them to page state (vision mode).
    /// Default: false
    pub use_vision: bool,

    /// Timeout per browser action in milliseconds.
    /// Default: 30000
    pub action_timeout_ms: u64,

    /// Timeout per LLM call in milliseconds.
    /// Default: 60000
    pub llm_timeout_ms: u64,

    /// Pause between actions within one step, in milliseconds.
    /// Default: 100
    pub wait_between_actions_ms: u64,

    /// Number of most recent steps rendered in full in the prompt; older
    /// steps collapse to one summary line each.
    /// Default: 10
    pub history_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            max_actions_per_step: 3,
            max_consecutive_failures: 3,
            use_vision: false,
            action_timeout_ms: 30_000,
            llm_timeout_ms: 60_000,
            wait_between_actions_ms: 100,
            history_window: 10,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small limits and no inter-action pauses, for tests.
    pub fn minimal() -> Self {
        Self {
            max_steps: 10,
            max_actions_per_step: 1,
            max_consecutive_failures: 2,
            use_vision: false,
            action_timeout_ms: 2_000,
            llm_timeout_ms: 5_000,
            wait_between_actions_ms: 0,
            history_window: 5,
        }
    }

    /// Builder: set max steps.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: set vision mode.
    pub fn vision(mut self, enabled: bool) -> Self {
        self.use_vision = enabled;
        self
    }

    /// Builder: set max actions per step.
    pub fn actions_per_step(mut self, count: u32) -> Self {
        self.max_actions_per_step = count;
        self
    }

    /// Builder: set the LLM call timeout.
    pub fn llm_timeout(mut self, ms: u64) -> Self {
        self.llm_timeout_ms = ms;
        self
    }
}
