//! The agent loop: Planning -> Executing -> Recording -> {Planning | Terminated}.
//!
//! Terminal states are `Finished` (a done action reported success),
//! `Exhausted` (step budget spent), `Failed` (planning failed after
//! retry, the model reported failure, or too many consecutive step
//! failures) and `Cancelled` (cooperative stop between steps). Step-level
//! errors never escape the loop; callers always get a [`RunResult`] with
//! whatever history accumulated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::executor::ActionExecutor;
use crate::history::{RunResult, StepHistory};
use crate::llm::{DecideRequest, LlmProvider};
use crate::types::{ActionKind, AgentOutput, Observation, StepRecord, Task};

/// One task, one LLM handle, one exclusively-owned browser session.
pub struct Agent {
    task: Task,
    llm: Arc<dyn LlmProvider>,
    config: AgentConfig,
    executor: ActionExecutor,
}

/// Outcome of the action batch within one step.
struct StepOutcome {
    observations: Vec<Observation>,
    error: Option<String>,
    /// Set when a `done` action terminated the batch: (success, message).
    done: Option<(bool, String)>,
}

impl Agent {
    pub fn new(task: Task, llm: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        let executor = ActionExecutor::new(config.clone());
        Self {
            task,
            llm,
            config,
            executor,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Run the loop to a terminal state. Never panics and never returns
    /// an error: partial progress is always reported through the result.
    pub async fn run(
        &self,
        session: &dyn BrowserSession,
        cancel: &CancellationToken,
    ) -> RunResult {
        let start = Instant::now();
        let mut history = StepHistory::new();
        let mut consecutive_failures: u32 = 0;

        info!(task = %self.task.id, max_steps = self.config.max_steps, "agent run started");

        for step_number in 1..=self.config.max_steps {
            if cancel.is_cancelled() {
                info!(task = %self.task.id, step = step_number, "cancelled between steps");
                return RunResult::cancelled(history, elapsed_ms(start));
            }

            // Observe.
            let state = match session.state().await {
                Ok(mut state) => {
                    if self.config.use_vision && state.screenshot_base64.is_none() {
                        state.screenshot_base64 =
                            session.screenshot().await.ok().flatten();
                    }
                    state
                }
                Err(err) => {
                    warn!(task = %self.task.id, step = step_number, %err, "observe failed");
                    history.record(StepRecord::from_error(step_number, err.to_string()));
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return RunResult::failed(
                            format!("browser unavailable: {err}"),
                            history,
                            elapsed_ms(start),
                        );
                    }
                    continue;
                }
            };

            // Think, with one corrective retry on planning failure.
            let output = match self.decide(&state, &history).await {
                Ok(output) => output,
                Err(err) => {
                    history.record(StepRecord::from_error(step_number, err.to_string()));
                    return RunResult::failed(err.to_string(), history, elapsed_ms(start));
                }
            };

            debug!(
                task = %self.task.id,
                step = step_number,
                goal = %output.next_goal,
                actions = output.actions.len(),
                "planned step"
            );

            // Act.
            let outcome = self.execute_batch(&output, session).await;
            let executed = output
                .actions
                .iter()
                .take(outcome.observations.len())
                .cloned()
                .collect();
            history.record(StepRecord::from_output(
                step_number,
                state.summary(),
                &output,
                executed,
                outcome.observations,
                outcome.error.clone(),
            ));

            if let Some((success, message)) = outcome.done {
                let elapsed = elapsed_ms(start);
                info!(task = %self.task.id, step = step_number, success, "agent run finished");
                return if success {
                    RunResult::finished(message, history, elapsed)
                } else {
                    RunResult::failed(message, history, elapsed)
                };
            }

            if outcome.error.is_some() {
                consecutive_failures += 1;
                if consecutive_failures >= self.config.max_consecutive_failures {
                    return RunResult::failed(
                        format!("{consecutive_failures} consecutive step failures"),
                        history,
                        elapsed_ms(start),
                    );
                }
            } else {
                consecutive_failures = 0;
            }
        }

        info!(task = %self.task.id, steps = history.len(), "step budget exhausted");
        RunResult::exhausted(history, elapsed_ms(start))
    }

    /// One planning call, retried once with the parse error as a
    /// corrective hint before becoming terminal.
    async fn decide(
        &self,
        state: &crate::browser::PageState,
        history: &StepHistory,
    ) -> Result<AgentOutput, AgentError> {
        let first = self.decide_once(state, history, None).await;
        match first {
            Ok(output) => Ok(output),
            Err(err) => {
                warn!(task = %self.task.id, %err, "planning failed; retrying with correction");
                let hint = err.to_string();
                self.decide_once(state, history, Some(&hint)).await
            }
        }
    }

    async fn decide_once(
        &self,
        state: &crate::browser::PageState,
        history: &StepHistory,
        correction: Option<&str>,
    ) -> Result<AgentOutput, AgentError> {
        let request = DecideRequest {
            task: &self.task,
            state,
            history,
            history_window: self.config.history_window,
            correction,
        };
        let deadline = Duration::from_millis(self.config.llm_timeout_ms);
        match timeout(deadline, self.llm.decide(request)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::planning(format!(
                "llm call timed out after {}ms",
                self.config.llm_timeout_ms
            ))),
        }
    }

    /// Execute up to `max_actions_per_step` actions, stopping early on the
    /// first failure or on a `done` action.
    async fn execute_batch(
        &self,
        output: &AgentOutput,
        session: &dyn BrowserSession,
    ) -> StepOutcome {
        let mut observations = Vec::new();
        let mut error = None;
        let mut done = None;

        let max_actions = self.config.max_actions_per_step as usize;
        let batch = &output.actions[..output.actions.len().min(max_actions)];

        for (i, action) in batch.iter().enumerate() {
            if action.kind == ActionKind::Done {
                let success = action.params.success.unwrap_or(false);
                let message = action
                    .params
                    .message
                    .clone()
                    .unwrap_or_else(|| "Task completed".to_string());
                observations.push(Observation::finished(success, message.clone()));
                done = Some((success, message));
                break;
            }

            let observation = self.executor.execute(action, session).await;
            let failed = !observation.success;
            if failed {
                error = observation.error.clone();
            }
            observations.push(observation);
            if failed {
                break;
            }

            if i + 1 < batch.len() && self.config.wait_between_actions_ms > 0 {
                sleep(Duration::from_millis(self.config.wait_between_actions_ms)).await;
            }
        }

        StepOutcome {
            observations,
            error,
            done,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
