use thiserror::Error;

/// Errors emitted by the research pipeline.
///
/// Per-query browsing failures are absorbed into the round (a query that
/// produced nothing is just an empty finding set); only synthesis and
/// report persistence can fail the whole call.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The final report generation failed. Terminal: there is no partial
    /// report below the synthesis boundary.
    #[error("report synthesis failed: {0}")]
    Synthesis(String),

    /// Writing the report file failed.
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResearchError {
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis(message.into())
    }
}
