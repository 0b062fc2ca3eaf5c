//! LLM capability surface.
//!
//! The model is a non-deterministic collaborator: every consumer must
//! treat malformed output as a first-class error path. [`parse_agent_output`]
//! is the single place raw decision text becomes a typed [`AgentOutput`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::browser::PageState;
use crate::errors::AgentError;
use crate::history::StepHistory;
use crate::types::{ActionKind, AgentAction, AgentOutput, Task};

/// Everything the provider needs to produce the next decision.
#[derive(Debug)]
pub struct DecideRequest<'a> {
    pub task: &'a Task,
    pub state: &'a PageState,
    pub history: &'a StepHistory,
    /// Number of recent steps to render in full; older steps collapse.
    pub history_window: usize,
    /// Set on the second attempt after a planning failure; carries the
    /// parse error so the model can correct itself.
    pub correction: Option<&'a str>,
}

/// Abstraction over LLM vendors.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Decide the next action(s) for one loop iteration.
    async fn decide(&self, request: DecideRequest<'_>) -> Result<AgentOutput, AgentError>;

    /// Free-text completion, used for query planning and report synthesis.
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Parse a raw model response into an [`AgentOutput`].
///
/// Accepts the JSON object directly or wrapped in a fenced code block.
/// An output with no actions is a planning failure: the loop would spin
/// without it.
pub fn parse_agent_output(raw: &str) -> Result<AgentOutput, AgentError> {
    let json = extract_json_block(raw);
    let output: AgentOutput = serde_json::from_str(json)
        .map_err(|err| AgentError::planning(format!("unparseable decision: {err}")))?;
    if output.actions.is_empty() {
        return Err(AgentError::planning("decision contains no actions"));
    }
    Ok(output)
}

/// Strip a ```json fence if present, otherwise slice from the first `{`
/// to the last `}`.
fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body.trim(),
    }
}

/// Deterministic provider for tests and offline development.
///
/// With no scripted decisions it follows a fixed rule: navigate on the
/// first step, then extract content, then report done. Scripted decisions
/// and completions are served in FIFO order before the rule kicks in.
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    decisions: Mutex<VecDeque<Result<AgentOutput, AgentError>>>,
    completions: Mutex<VecDeque<String>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the given decisions first, in order.
    pub fn with_decisions(decisions: Vec<AgentOutput>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().map(Ok).collect()),
            completions: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a decision outcome, including planning failures.
    pub fn push_decision(&self, decision: Result<AgentOutput, AgentError>) {
        self.decisions.lock().unwrap().push_back(decision);
    }

    /// Queue a free-text completion.
    pub fn push_completion(&self, completion: impl Into<String>) {
        self.completions.lock().unwrap().push_back(completion.into());
    }

    /// Completions still queued; zero means everything was consumed.
    pub fn pending_completions(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    fn rule_based(&self, request: &DecideRequest<'_>) -> AgentOutput {
        let steps = request.history.len();
        match steps {
            0 => AgentOutput::single(
                "Start by opening the page.",
                AgentAction::navigate("https://example.com"),
            ),
            1 => AgentOutput::single(
                "Read the page content.",
                AgentAction::extract_content(),
            ),
            _ => AgentOutput::done(
                true,
                format!("Mock task completed after {steps} steps"),
            ),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn decide(&self, request: DecideRequest<'_>) -> Result<AgentOutput, AgentError> {
        if request.task.instruction.trim().is_empty() {
            return Err(AgentError::planning("task instruction is empty"));
        }
        let scripted = self.decisions.lock().unwrap().pop_front();
        match scripted {
            Some(decision) => decision,
            None => Ok(self.rule_based(&request)),
        }
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AgentError> {
        let scripted = self.completions.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| "[]".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"thinking":"go","next_goal":"open page","actions":[{"action":"navigate","url":"https://example.com"}]}"#;
        let output = parse_agent_output(raw).unwrap();
        assert_eq!(output.actions.len(), 1);
        assert_eq!(output.actions[0].kind, ActionKind::Navigate);
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let raw = "Here is my decision:\n```json\n{\"thinking\":\"t\",\"actions\":[{\"action\":\"done\",\"success\":true,\"message\":\"ok\"}]}\n```";
        // Fence is not at the start, so the brace slice path applies.
        let output = parse_agent_output(raw).unwrap();
        assert!(output.is_done());
    }

    #[test]
    fn rejects_empty_action_list() {
        let err = parse_agent_output(r#"{"thinking":"hmm","actions":[]}"#).unwrap_err();
        assert!(matches!(err, AgentError::Planning(_)));
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_agent_output("I would click the button").unwrap_err();
        assert!(matches!(err, AgentError::Planning(_)));
    }

    #[tokio::test]
    async fn mock_rule_finishes_after_two_steps() {
        use crate::history::StepHistory;
        use crate::types::StepRecord;

        let llm = MockLlmProvider::new();
        let task = Task::new("demo");
        let state = PageState::default();
        let mut history = StepHistory::new();

        for expected_done in [false, false, true] {
            let output = llm
                .decide(DecideRequest {
                    task: &task,
                    state: &state,
                    history: &history,
                    history_window: 10,
                    correction: None,
                })
                .await
                .unwrap();
            assert_eq!(output.is_done(), expected_done);
            history.record(StepRecord::from_output(
                history.len() as u32 + 1,
                "page",
                &output,
                output.actions.clone(),
                vec![],
                None,
            ));
        }
    }
}
