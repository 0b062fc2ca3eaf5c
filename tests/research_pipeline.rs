//! Deep-research pipeline scenarios with mock LLM and scripted browser.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use webscout_agent::{
    AgentConfig, AgentError, AgentOutput, BrowserProvider, BrowserSession, DecideRequest,
    LlmProvider, MockLlmProvider, PageState, ScriptedBrowser, ScriptedProvider, ScrollDirection,
};
use webscout_research::{DeepResearcher, ResearchConfig, ResearchError};

fn config(dir: &std::path::Path) -> ResearchConfig {
    ResearchConfig {
        agent: AgentConfig::minimal(),
        ..ResearchConfig::default()
    }
    .output_dir(dir)
}

/// Wraps the mock provider to observe synthesis prompts and, optionally,
/// cancel the run from inside a browsing sub-agent's decision call.
struct InstrumentedLlm {
    inner: MockLlmProvider,
    cancel_on_decide: Option<CancellationToken>,
    completion_prompts: Mutex<Vec<String>>,
}

impl InstrumentedLlm {
    fn new(inner: MockLlmProvider) -> Self {
        Self {
            inner,
            cancel_on_decide: None,
            completion_prompts: Mutex::new(Vec::new()),
        }
    }

    fn cancelling(inner: MockLlmProvider, cancel: CancellationToken) -> Self {
        Self {
            cancel_on_decide: Some(cancel),
            ..Self::new(inner)
        }
    }

    fn completion_prompts(&self) -> Vec<String> {
        self.completion_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for InstrumentedLlm {
    async fn decide(&self, request: DecideRequest<'_>) -> Result<AgentOutput, AgentError> {
        let decision = self.inner.decide(request).await;
        if let Some(cancel) = &self.cancel_on_decide {
            cancel.cancel();
        }
        decision
    }

    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        self.completion_prompts
            .lock()
            .unwrap()
            .push(prompt.to_string());
        self.inner.complete(prompt).await
    }
}

/// Provider that keeps a handle to every session it hands out, so tests
/// can check that each one was released.
#[derive(Default)]
struct TrackingProvider {
    sessions: Mutex<Vec<Arc<ScriptedBrowser>>>,
}

impl TrackingProvider {
    fn handed_out(&self) -> Vec<Arc<ScriptedBrowser>> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserProvider for TrackingProvider {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AgentError> {
        let session = Arc::new(ScriptedBrowser::new());
        self.sessions.lock().unwrap().push(session.clone());
        Ok(Box::new(SharedSession(session)))
    }
}

struct SharedSession(Arc<ScriptedBrowser>);

#[async_trait]
impl BrowserSession for SharedSession {
    async fn state(&self) -> Result<PageState, AgentError> {
        self.0.state().await
    }

    async fn navigate(&self, url: &str) -> Result<(), AgentError> {
        self.0.navigate(url).await
    }

    async fn click(&self, index: u32) -> Result<(), AgentError> {
        self.0.click(index).await
    }

    async fn type_text(&self, index: u32, text: &str, submit: bool) -> Result<(), AgentError> {
        self.0.type_text(index, text, submit).await
    }

    async fn select_option(&self, index: u32, value: &str) -> Result<(), AgentError> {
        self.0.select_option(index, value).await
    }

    async fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), AgentError> {
        self.0.scroll(direction, amount).await
    }

    async fn extract_content(&self) -> Result<String, AgentError> {
        self.0.extract_content().await
    }

    async fn search(&self, query: &str) -> Result<(), AgentError> {
        self.0.search(query).await
    }

    async fn screenshot(&self) -> Result<Option<String>, AgentError> {
        self.0.screenshot().await
    }

    async fn close(&self) -> Result<(), AgentError> {
        self.0.close().await
    }
}

#[tokio::test]
async fn one_round_of_research_writes_an_absolute_report() {
    let tmp = tempfile::tempdir().unwrap();
    let mock = MockLlmProvider::with_decisions(vec![AgentOutput::done(
        true,
        "Browser agents pair an LLM planner with page tools.",
    )]);
    mock.push_completion(r#"["what are browser agents"]"#);
    mock.push_completion("# Browser agents\n\nThey pair an LLM planner with page tools.");
    let llm = Arc::new(InstrumentedLlm::new(mock));

    let researcher = DeepResearcher::new(
        llm.clone(),
        Arc::new(ScriptedProvider),
        config(tmp.path()).iterations(1).queries_per_round(1),
    );

    let report = researcher
        .research("Write a brief report about browser agents", &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.path.is_absolute());
    assert_eq!(std::fs::read_to_string(&report.path).unwrap(), report.text);
    assert!(report.text.contains("Browser agents"));

    // One planning prompt, one synthesis prompt carrying the finding.
    let prompts = llm.completion_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("LLM planner with page tools"));
    assert_eq!(llm.inner.pending_completions(), 0);
}

#[tokio::test]
async fn cancellation_after_first_round_synthesizes_partial_findings() {
    let tmp = tempfile::tempdir().unwrap();

    // Round 1: one query, one sub-agent that finishes with a finding and
    // trips the stop signal from inside its decision call. Round 2 must
    // never be planned.
    let mock = MockLlmProvider::with_decisions(vec![AgentOutput::done(
        true,
        "finding from the only completed round",
    )]);
    mock.push_completion(r#"["first round query"]"#);
    mock.push_completion("# Partial report\n\nBased on round one only.");

    let cancel = CancellationToken::new();
    let llm = Arc::new(InstrumentedLlm::cancelling(mock, cancel.clone()));

    let researcher = DeepResearcher::new(
        llm.clone(),
        Arc::new(ScriptedProvider),
        config(tmp.path()).iterations(5).queries_per_round(1),
    );

    let report = researcher
        .research("long-running research task", &cancel)
        .await
        .unwrap();

    assert!(report.text.contains("Partial report"));

    let prompts = llm.completion_prompts();
    assert_eq!(prompts.len(), 2, "expected one planning and one synthesis call");
    assert!(
        prompts[1].contains("finding from the only completed round"),
        "synthesis must see the round-1 finding"
    );
}

#[tokio::test]
async fn empty_final_round_stops_early_but_still_reports() {
    let tmp = tempfile::tempdir().unwrap();

    // Round 1 yields a finding; round 2's planner returns nothing new, so
    // rounds stop there even though five are allowed.
    let mock = MockLlmProvider::with_decisions(vec![AgentOutput::done(true, "only finding")]);
    mock.push_completion(r#"["q1"]"#);
    mock.push_completion("[]");
    mock.push_completion("# Report\n\nOnly finding, written up.");
    let llm = Arc::new(InstrumentedLlm::new(mock));

    let researcher = DeepResearcher::new(
        llm.clone(),
        Arc::new(ScriptedProvider),
        config(tmp.path()).iterations(5).queries_per_round(1),
    );

    let report = researcher
        .research("task", &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.text.contains("Only finding"));
    // Two planning calls plus synthesis; no third round was attempted.
    assert_eq!(llm.completion_prompts().len(), 3);
}

#[tokio::test]
async fn every_subagent_session_is_closed_after_the_round() {
    let tmp = tempfile::tempdir().unwrap();

    // Rule-based mock drives both sub-agents to completion.
    let mock = MockLlmProvider::new();
    mock.push_completion(r#"["query one", "query two"]"#);
    mock.push_completion("# Report\n\nBoth queries answered.");

    let provider = Arc::new(TrackingProvider::default());
    let researcher = DeepResearcher::new(
        Arc::new(InstrumentedLlm::new(mock)),
        provider.clone(),
        config(tmp.path()).iterations(1).queries_per_round(2),
    );

    researcher
        .research("task", &CancellationToken::new())
        .await
        .unwrap();

    let sessions = provider.handed_out();
    assert_eq!(sessions.len(), 2);
    for session in &sessions {
        assert!(session.is_closed(), "sub-agent session left open");
    }
}

#[tokio::test]
async fn failed_browsing_run_still_releases_its_session() {
    let tmp = tempfile::tempdir().unwrap();

    // Both planning attempts fail, so the sub-agent run ends Failed and
    // yields no finding; its session must still be closed.
    let mock = MockLlmProvider::new();
    mock.push_decision(Err(AgentError::planning("bad json")));
    mock.push_decision(Err(AgentError::planning("bad json again")));
    mock.push_completion(r#"["doomed query"]"#);
    mock.push_completion("# Report\n\nNothing usable was gathered.");

    let provider = Arc::new(TrackingProvider::default());
    let researcher = DeepResearcher::new(
        Arc::new(InstrumentedLlm::new(mock)),
        provider.clone(),
        config(tmp.path()).iterations(1).queries_per_round(1),
    );

    let report = researcher
        .research("task", &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.text.contains("Nothing usable"));

    let sessions = provider.handed_out();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_closed());
}

#[tokio::test]
async fn synthesis_error_surfaces_to_the_caller() {
    let tmp = tempfile::tempdir().unwrap();
    let mock = MockLlmProvider::new();
    mock.push_completion("[]");
    mock.push_completion(""); // empty synthesis output is an error

    let researcher = DeepResearcher::new(
        Arc::new(InstrumentedLlm::new(mock)),
        Arc::new(ScriptedProvider),
        config(tmp.path()).iterations(1),
    );

    let err = researcher
        .research("task", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Synthesis(_)));
}
