//! WebScout deep research.
//!
//! Outer loop over the agent core: each round the LLM plans search
//! queries, one browsing sub-agent runs per query, findings accumulate,
//! and a final synthesis call turns them into a written report.

pub mod errors;
pub mod findings;
pub mod planner;
pub mod research;

pub use errors::ResearchError;
pub use findings::{Finding, ReportState};
pub use planner::QueryPlanner;
pub use research::{DeepResearcher, ResearchConfig, ResearchReport};
