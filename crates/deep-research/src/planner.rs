//! Per-round query planning.

use std::sync::Arc;

use tracing::{debug, warn};

use webscout_agent::LlmProvider;

use crate::findings::ReportState;

/// Asks the LLM for this round's search queries.
///
/// Fails open on every path: a provider error or unusable response yields
/// an empty round, logged and skipped, never a fatal error.
pub struct QueryPlanner {
    llm: Arc<dyn LlmProvider>,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Plan up to `max_query_num` queries, deduplicated within the round
    /// and against every prior round.
    pub async fn plan_queries(
        &self,
        task: &str,
        state: &ReportState,
        max_query_num: usize,
    ) -> Vec<String> {
        let prompt = build_planning_prompt(task, state, max_query_num);
        let raw = match self.llm.complete(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "query planning call failed; skipping round");
                return Vec::new();
            }
        };

        let mut queries = Vec::new();
        for candidate in parse_queries(&raw) {
            let candidate = candidate.trim();
            if candidate.is_empty() || state.has_seen(candidate) {
                continue;
            }
            if queries
                .iter()
                .any(|q: &String| q.eq_ignore_ascii_case(candidate))
            {
                continue;
            }
            queries.push(candidate.to_string());
            if queries.len() >= max_query_num {
                break;
            }
        }

        debug!(planned = queries.len(), "query planning round complete");
        queries
    }
}

fn build_planning_prompt(task: &str, state: &ReportState, max_query_num: usize) -> String {
    format!(
        "You are planning web research for the task below.\n\n\
         ## Task\n{task}\n\n\
         ## Findings so far\n{}\n\n\
         Produce up to {max_query_num} NEW web search queries that would fill the \
         remaining gaps. Do not repeat earlier queries. If the findings already \
         cover the task, return an empty list.\n\n\
         Respond with ONLY a JSON array of strings, e.g. [\"query one\", \"query two\"].",
        state.digest()
    )
}

/// Parse the planner response: a JSON array of strings, possibly fenced.
/// Falls back to bulleted lines so a chatty model still yields a round;
/// plain prose (refusals, apologies) parses to nothing and the round
/// fails open.
fn parse_queries(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let json_slice = match (body.find('['), body.rfind(']')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };

    if let Ok(queries) = serde_json::from_str::<Vec<String>>(json_slice) {
        return queries;
    }

    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix('-').or_else(|| line.strip_prefix('*'))
        })
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}
