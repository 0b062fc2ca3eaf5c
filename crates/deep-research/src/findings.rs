//! Accumulated research state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of extracted information, tagged with the query that
/// produced it. Findings are never deleted within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub query: String,
    pub content: String,
    pub recorded_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(query: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            content: content.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Findings plus round bookkeeping, mutated once per outer-loop round and
/// consumed exactly once at synthesis.
#[derive(Debug, Default)]
pub struct ReportState {
    findings: Vec<Finding>,
    rounds_completed: u32,
    seen_queries: HashSet<String>,
}

impl ReportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Mark queries as issued so later rounds never repeat them.
    pub fn note_queries<S: AsRef<str>>(&mut self, queries: &[S]) {
        for query in queries {
            self.seen_queries.insert(normalize_query(query.as_ref()));
        }
    }

    /// Whether an equivalent query was issued in any prior round.
    pub fn has_seen(&self, query: &str) -> bool {
        self.seen_queries.contains(&normalize_query(query))
    }

    pub fn complete_round(&mut self) {
        self.rounds_completed += 1;
    }

    pub fn rounds_completed(&self) -> u32 {
        self.rounds_completed
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Compact digest of everything gathered so far, fed back to the
    /// planner and the synthesizer.
    pub fn digest(&self) -> String {
        if self.findings.is_empty() {
            return "(no findings yet)".to_string();
        }
        self.findings
            .iter()
            .enumerate()
            .map(|(i, f)| format!("[{}] query: {}\n{}", i + 1, f.query, f.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_deduplicated_case_insensitively() {
        let mut state = ReportState::new();
        state.note_queries(&["Rust async runtimes"]);
        assert!(state.has_seen("rust async runtimes"));
        assert!(state.has_seen("  Rust Async Runtimes  "));
        assert!(!state.has_seen("rust web frameworks"));
    }

    #[test]
    fn digest_lists_findings_with_their_queries() {
        let mut state = ReportState::new();
        assert_eq!(state.digest(), "(no findings yet)");

        state.add_finding(Finding::new("q1", "first result"));
        state.add_finding(Finding::new("q2", "second result"));
        let digest = state.digest();
        assert!(digest.contains("[1] query: q1"));
        assert!(digest.contains("second result"));
    }

    #[test]
    fn rounds_are_counted() {
        let mut state = ReportState::new();
        state.complete_round();
        state.complete_round();
        assert_eq!(state.rounds_completed(), 2);
    }
}
