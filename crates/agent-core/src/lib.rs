//! WebScout agent core.
//!
//! Implements the observe-think-act loop that drives a browser task to
//! completion: at each step the LLM is consulted for the next action(s)
//! based on the current page state and the run history so far.
//!
//! ```text
//! while !done && steps < max:
//!     state  = session.state()     // Observe current page
//!     output = llm.decide()        // LLM picks 1-3 actions
//!     obs    = executor.execute()  // Run them against the browser
//!     history.record(step)         // Append-only run log
//! ```
//!
//! The LLM and the browser are both capability traits ([`LlmProvider`],
//! [`BrowserSession`]); the loop never depends on a concrete vendor.

pub mod agent;
pub mod browser;
pub mod config;
pub mod errors;
pub mod executor;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod types;

pub use agent::Agent;
pub use browser::{BrowserProvider, BrowserSession, PageState, ScriptedBrowser, ScriptedProvider};
pub use config::AgentConfig;
pub use errors::AgentError;
pub use executor::ActionExecutor;
pub use history::{RunResult, RunStatus, StepHistory};
pub use llm::{parse_agent_output, DecideRequest, LlmProvider, MockLlmProvider};
pub use types::{
    ActionKind, ActionParams, AgentAction, AgentOutput, Observation, ScrollDirection, StepRecord,
    Task,
};
