//! Append-only run history with pure derived views.
//!
//! History is never mutated after a record is appended; every query scans
//! the stored sequence on demand. At the expected scale (hundreds of
//! steps) caching derived fields would only create room for desync.

use serde::{Deserialize, Serialize};

use crate::types::{ActionKind, AgentAction, StepRecord};

/// Ordered, append-only log of one agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepHistory {
    records: Vec<StepRecord>,
}

impl StepHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record. There is deliberately no way to remove or
    /// reorder entries.
    pub fn record(&mut self, step: StepRecord) {
        self.records.push(step);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// Completion message of the last successful `done` action, if the
    /// run ever reached one.
    pub fn final_result(&self) -> Option<String> {
        self.records.iter().rev().find_map(|record| {
            record
                .actions
                .iter()
                .zip(record.observations.iter())
                .find(|(action, observation)| {
                    action.kind == ActionKind::Done && observation.success
                })
                .and_then(|(_, observation)| observation.content.clone())
        })
    }

    /// Every error encountered, in order: step-level errors followed by
    /// per-observation errors within each step.
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for record in &self.records {
            if let Some(err) = &record.error {
                errors.push(err.clone());
            }
            for observation in &record.observations {
                if let Some(err) = &observation.error {
                    if record.error.as_deref() != Some(err.as_str()) {
                        errors.push(err.clone());
                    }
                }
            }
        }
        errors
    }

    /// All actions the model emitted, flattened in execution order.
    pub fn model_actions(&self) -> Vec<AgentAction> {
        self.records
            .iter()
            .flat_map(|record| record.actions.iter().cloned())
            .collect()
    }

    /// All reasoning traces, one per step that produced one.
    pub fn model_thoughts(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|record| record.thought.clone())
            .collect()
    }
}

/// Terminal state of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A `done` action reported success.
    Finished,
    /// Step budget ran out without completion. Not a failure; the final
    /// result is simply absent.
    Exhausted,
    /// Planning failed after retry, the model reported failure, or too
    /// many consecutive steps errored.
    Failed,
    /// The cooperative stop signal fired between steps.
    Cancelled,
}

/// Terminal summary of one run, derived from the full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// Completion or error message.
    pub message: String,
    pub steps_taken: u32,
    pub total_time_ms: u64,
    pub history: StepHistory,
}

impl RunResult {
    pub fn finished(message: String, history: StepHistory, total_time_ms: u64) -> Self {
        Self {
            status: RunStatus::Finished,
            steps_taken: history.len() as u32,
            message,
            total_time_ms,
            history,
        }
    }

    pub fn exhausted(history: StepHistory, total_time_ms: u64) -> Self {
        Self {
            status: RunStatus::Exhausted,
            steps_taken: history.len() as u32,
            message: format!("reached maximum steps: {}", history.len()),
            total_time_ms,
            history,
        }
    }

    pub fn failed(message: String, history: StepHistory, total_time_ms: u64) -> Self {
        Self {
            status: RunStatus::Failed,
            steps_taken: history.len() as u32,
            message,
            total_time_ms,
            history,
        }
    }

    pub fn cancelled(history: StepHistory, total_time_ms: u64) -> Self {
        Self {
            status: RunStatus::Cancelled,
            steps_taken: history.len() as u32,
            message: "run cancelled".to_string(),
            total_time_ms,
            history,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Finished
    }

    /// Final result text, present only when the run finished.
    pub fn final_result(&self) -> Option<String> {
        self.history.final_result()
    }

    pub fn errors(&self) -> Vec<String> {
        self.history.errors()
    }
}
