//! The outer research loop and report synthesis.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webscout_agent::{
    Agent, AgentConfig, BrowserProvider, LlmProvider, RunResult, Task,
};

use crate::errors::ResearchError;
use crate::findings::{Finding, ReportState};
use crate::planner::QueryPlanner;

/// Tunables for one research call.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Maximum outer-loop rounds.
    /// Default: 3
    pub max_search_iterations: u32,

    /// Maximum queries planned per round.
    /// Default: 3
    pub max_query_num: usize,

    /// Directory the report file is written into.
    /// Default: `./reports`
    pub output_dir: PathBuf,

    /// Configuration for the browsing sub-agents.
    pub agent: AgentConfig,

    /// Timeout for the synthesis LLM call in milliseconds.
    /// Default: 120000
    pub synthesis_timeout_ms: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_search_iterations: 3,
            max_query_num: 3,
            output_dir: PathBuf::from("./reports"),
            agent: AgentConfig::default(),
            synthesis_timeout_ms: 120_000,
        }
    }
}

impl ResearchConfig {
    /// Builder: set the round bound.
    pub fn iterations(mut self, rounds: u32) -> Self {
        self.max_search_iterations = rounds;
        self
    }

    /// Builder: set queries per round.
    pub fn queries_per_round(mut self, count: usize) -> Self {
        self.max_query_num = count;
        self
    }

    /// Builder: set the report output directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

/// Final artifact of a research call.
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub text: String,
    /// Absolute path of the written report file.
    pub path: PathBuf,
}

/// Drives rounds of query planning and browsing, then synthesizes the
/// accumulated findings into a written report.
pub struct DeepResearcher {
    llm: Arc<dyn LlmProvider>,
    browser: Arc<dyn BrowserProvider>,
    config: ResearchConfig,
}

impl DeepResearcher {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        browser: Arc<dyn BrowserProvider>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            llm,
            browser,
            config,
        }
    }

    /// Run the research pipeline to completion.
    ///
    /// Browsing failures only shrink the finding set; the single fatal
    /// path below the round loop is synthesis (and writing the report).
    pub async fn research(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<ResearchReport, ResearchError> {
        let planner = QueryPlanner::new(Arc::clone(&self.llm));
        let mut state = ReportState::new();

        info!(
            rounds = self.config.max_search_iterations,
            queries_per_round = self.config.max_query_num,
            "deep research started"
        );

        for round in 1..=self.config.max_search_iterations {
            if cancel.is_cancelled() {
                info!(round, "cancelled between rounds; proceeding to synthesis");
                break;
            }

            let queries = planner
                .plan_queries(task, &state, self.config.max_query_num)
                .await;
            if queries.is_empty() {
                info!(round, "planner produced no new queries; stopping rounds");
                break;
            }
            state.note_queries(&queries);

            let found = self.run_round(task, round, queries, cancel).await;
            for finding in found.iter() {
                debug!(query = %finding.query, "collected finding");
            }
            let new_findings = found.len();
            for finding in found {
                state.add_finding(finding);
            }
            state.complete_round();

            if new_findings == 0 {
                info!(round, "round yielded no new findings; stopping early");
                break;
            }
        }

        let text = self.synthesize(task, &state).await?;
        let path = self.write_report(&text).await?;
        info!(path = %path.display(), findings = state.findings().len(), "report written");
        Ok(ResearchReport { text, path })
    }

    /// Dispatch one browsing sub-agent per query and join them all before
    /// the round completes. Sub-agents run concurrently on independent
    /// sessions; each session is closed on every exit path.
    async fn run_round(
        &self,
        task: &str,
        round: u32,
        queries: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<Finding> {
        let mut join_set = JoinSet::new();

        for query in queries {
            let llm = Arc::clone(&self.llm);
            let browser = Arc::clone(&self.browser);
            let agent_config = self.config.agent.clone();
            let cancel = cancel.clone();
            let sub_task = browsing_task(task, &query);

            join_set.spawn(async move {
                let session = match browser.new_session().await {
                    Ok(session) => session,
                    Err(err) => {
                        warn!(query = %query, %err, "failed to open browsing session");
                        return (query, None);
                    }
                };

                let agent = Agent::new(sub_task, llm, agent_config);
                let result = agent.run(session.as_ref(), &cancel).await;
                if let Err(err) = session.close().await {
                    warn!(query = %query, %err, "failed to close browsing session");
                }

                (query, extract_finding(&result))
            });
        }

        let mut findings = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((query, Some(content))) => findings.push(Finding::new(query, content)),
                Ok((query, None)) => {
                    debug!(query = %query, round, "query produced no finding");
                }
                Err(err) => warn!(%err, round, "browsing sub-agent panicked"),
            }
        }
        findings
    }

    /// One synthesis call over everything gathered. Always attempted,
    /// even when rounds produced nothing, so the caller gets either a
    /// report or an explicit error.
    async fn synthesize(&self, task: &str, state: &ReportState) -> Result<String, ResearchError> {
        let prompt = build_synthesis_prompt(task, state);
        let deadline = Duration::from_millis(self.config.synthesis_timeout_ms);

        let text = match timeout(deadline, self.llm.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return Err(ResearchError::synthesis(err.to_string())),
            Err(_) => {
                return Err(ResearchError::synthesis(format!(
                    "synthesis timed out after {}ms",
                    self.config.synthesis_timeout_ms
                )))
            }
        };

        if text.trim().is_empty() {
            return Err(ResearchError::synthesis("model returned an empty report"));
        }
        Ok(text)
    }

    async fn write_report(&self, text: &str) -> Result<PathBuf, ResearchError> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        // The directory exists now, so canonicalizing it cannot quietly
        // hand back a relative path.
        let dir = tokio::fs::canonicalize(&self.config.output_dir).await?;
        let filename = format!("report-{}.md", Utc::now().format("%Y%m%d-%H%M%S"));
        let path = dir.join(filename);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }
}

/// Instruction for one browsing sub-agent, scoped to a single query.
fn browsing_task(task: &str, query: &str) -> Task {
    Task::new(format!(
        "Search the web for \"{query}\" and extract the information relevant to \
         the research task. Finish with a `done` action whose message summarizes \
         what you found, with source URLs where possible."
    ))
    .with_supplementary(format!("Overall research task: {task}"))
}

fn build_synthesis_prompt(task: &str, state: &ReportState) -> String {
    format!(
        "Write a structured research report for the task below, based on the \
         collected findings.\n\n\
         ## Task\n{task}\n\n\
         ## Findings ({} rounds)\n{}\n\n\
         Produce a markdown report with a short summary, detailed sections, and \
         a source list. If the findings are insufficient, state explicitly what \
         is missing.",
        state.rounds_completed(),
        state.digest()
    )
}

/// Pull the useful content out of a sub-agent run: the final result when
/// the run finished, otherwise the last extracted page content.
fn extract_finding(result: &RunResult) -> Option<String> {
    if let Some(final_result) = result.final_result() {
        return Some(final_result);
    }
    result
        .history
        .records()
        .iter()
        .rev()
        .flat_map(|record| record.observations.iter().rev())
        .find_map(|observation| observation.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use webscout_agent::{AgentOutput, MockLlmProvider, ScriptedProvider};

    fn test_config(dir: &std::path::Path) -> ResearchConfig {
        ResearchConfig {
            agent: AgentConfig::minimal(),
            ..ResearchConfig::default()
        }
        .output_dir(dir)
    }

    #[tokio::test]
    async fn single_round_single_query_produces_report() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = MockLlmProvider::with_decisions(vec![AgentOutput::done(
            true,
            "AI agents are used for automation.",
        )]);
        llm.push_completion(r#"["ai agent applications"]"#);
        llm.push_completion("# Report\n\nAI agents are used for automation.");

        let researcher = DeepResearcher::new(
            Arc::new(llm),
            Arc::new(ScriptedProvider),
            test_config(tmp.path()).iterations(1).queries_per_round(1),
        );

        let report = researcher
            .research("Write a brief report about AI agents", &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.text.contains("AI agents"));
        assert!(report.path.is_absolute());
        assert!(report.path.exists());
        let written = std::fs::read_to_string(&report.path).unwrap();
        assert_eq!(written, report.text);
    }

    #[tokio::test]
    async fn empty_planner_round_still_synthesizes() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = MockLlmProvider::new();
        llm.push_completion("[]");
        llm.push_completion("# Report\n\nNothing was gathered.");

        let researcher = DeepResearcher::new(
            Arc::new(llm),
            Arc::new(ScriptedProvider),
            test_config(tmp.path()).iterations(3),
        );

        let report = researcher
            .research("task", &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.text.contains("Nothing was gathered"));
    }

    #[tokio::test]
    async fn synthesis_failure_is_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = MockLlmProvider::new();
        llm.push_completion("[]");
        llm.push_completion(""); // empty synthesis output

        let researcher = DeepResearcher::new(
            Arc::new(llm),
            Arc::new(ScriptedProvider),
            test_config(tmp.path()).iterations(1),
        );

        let err = researcher
            .research("task", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Synthesis(_)));
    }

    #[tokio::test]
    async fn relative_output_dir_still_yields_absolute_report_path() {
        let dir = format!("webscout-report-test-{}", std::process::id());
        let llm = MockLlmProvider::new();
        llm.push_completion("[]");
        llm.push_completion("# Report\n\nEmpty run.");

        let researcher = DeepResearcher::new(
            Arc::new(llm),
            Arc::new(ScriptedProvider),
            test_config(std::path::Path::new(&dir)).iterations(1),
        );

        let report = researcher
            .research("task", &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.path.is_absolute());
        assert!(report.path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn cancel_before_rounds_goes_straight_to_synthesis() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = MockLlmProvider::new();
        llm.push_completion("# Report\n\nStopped before any browsing.");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let researcher = DeepResearcher::new(
            Arc::new(llm),
            Arc::new(ScriptedProvider),
            test_config(tmp.path()).iterations(3),
        );

        let report = researcher.research("task", &cancel).await.unwrap();
        assert!(report.text.contains("Stopped before"));
    }

    #[test]
    fn finding_extraction_prefers_final_result() {
        use webscout_agent::{Observation, StepHistory, StepRecord};

        let mut history = StepHistory::new();
        let output = AgentOutput::done(true, "the final answer");
        history.record(StepRecord::from_output(
            1,
            "page",
            &output,
            output.actions.clone(),
            vec![Observation::finished(true, "the final answer")],
            None,
        ));
        let result = RunResult::finished("the final answer".into(), history, 5);
        assert_eq!(extract_finding(&result).as_deref(), Some("the final answer"));
    }

    #[test]
    fn finding_extraction_falls_back_to_extracted_content() {
        use webscout_agent::{AgentAction, Observation, StepHistory, StepRecord};

        let mut history = StepHistory::new();
        let output = AgentOutput::single("read", AgentAction::extract_content());
        history.record(StepRecord::from_output(
            1,
            "page",
            &output,
            output.actions.clone(),
            vec![Observation::ok().with_content("page text")],
            None,
        ));
        let result = RunResult::exhausted(history, 5);
        assert_eq!(extract_finding(&result).as_deref(), Some("page text"));
    }
}
