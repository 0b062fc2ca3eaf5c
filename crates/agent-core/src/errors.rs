use thiserror::Error;

/// Errors emitted by the agent loop and its collaborators.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The LLM response could not be turned into a valid set of actions.
    /// Retried once with a corrective hint, then terminal for the loop.
    #[error("planning failed: {0}")]
    Planning(String),

    /// An action carried malformed or missing parameters. Surfaced as an
    /// error observation; the loop continues.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The browser collaborator failed while executing an action.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The browser session itself is unusable (connect, page, close).
    #[error("browser error: {0}")]
    Browser(String),

    /// The run was stopped through the cooperative cancel signal.
    #[error("run cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn planning(message: impl Into<String>) -> Self {
        Self::Planning(message.into())
    }

    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::InvalidAction(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser(message.into())
    }
}
