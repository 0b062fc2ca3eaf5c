//! Action execution against the browser session.
//!
//! Every action produces exactly one observation. Malformed parameters
//! and collaborator failures are folded into error observations so a
//! single bad action can never crash the loop.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::browser::BrowserSession;
use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::types::{ActionKind, AgentAction, Observation, ScrollDirection};

const DEFAULT_SCROLL_AMOUNT: i32 = 600;
const MAX_WAIT_MS: u64 = 30_000;
const MAX_CONTENT_CHARS: usize = 20_000;

/// Validates and dispatches one action at a time.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    config: AgentConfig,
}

impl ActionExecutor {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Execute one action, returning exactly one observation.
    pub async fn execute(
        &self,
        action: &AgentAction,
        session: &dyn BrowserSession,
    ) -> Observation {
        if let Err(err) = validate(action) {
            warn!(kind = ?action.kind, %err, "rejected malformed action");
            return Observation::failure(err.to_string());
        }

        debug!(kind = ?action.kind, index = ?action.element_index, "executing action");

        let deadline = Duration::from_millis(self.config.action_timeout_ms);
        let outcome = match timeout(deadline, self.dispatch(action, session)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::execution(format!(
                "action {:?} timed out after {}ms",
                action.kind, self.config.action_timeout_ms
            ))),
        };

        let mut observation = match outcome {
            Ok(content) => {
                let mut obs = Observation::ok();
                obs.content = content;
                obs
            }
            Err(err) => Observation::failure(err.to_string()),
        };

        // Page identity is recorded even for failed actions; a best-effort
        // state read failing here must not mask the original error.
        if let Ok(state) = session.state().await {
            observation = observation.with_page(state.url, state.title);
        }

        if observation.success && self.config.use_vision {
            if let Ok(shot) = session.screenshot().await {
                observation.screenshot_base64 = shot;
            }
        }

        observation
    }

    /// Dispatch to the session primitive. Returns extracted content when
    /// the action produces any.
    async fn dispatch(
        &self,
        action: &AgentAction,
        session: &dyn BrowserSession,
    ) -> Result<Option<String>, AgentError> {
        match action.kind {
            ActionKind::Navigate => {
                let url = action.params.url.as_deref().unwrap_or_default();
                session.navigate(url).await?;
                Ok(None)
            }
            ActionKind::Click => {
                session.click(action.element_index.unwrap_or_default()).await?;
                Ok(None)
            }
            ActionKind::TypeText => {
                session
                    .type_text(
                        action.element_index.unwrap_or_default(),
                        action.params.text.as_deref().unwrap_or_default(),
                        action.params.submit.unwrap_or(false),
                    )
                    .await?;
                Ok(None)
            }
            ActionKind::Select => {
                session
                    .select_option(
                        action.element_index.unwrap_or_default(),
                        action.params.value.as_deref().unwrap_or_default(),
                    )
                    .await?;
                Ok(None)
            }
            ActionKind::Scroll => {
                let direction = action.params.direction.unwrap_or(ScrollDirection::Down);
                let amount = action.params.amount.unwrap_or(DEFAULT_SCROLL_AMOUNT);
                session.scroll(direction, amount).await?;
                Ok(None)
            }
            ActionKind::Wait => {
                let ms = action.params.ms.unwrap_or(1_000).min(MAX_WAIT_MS);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(None)
            }
            ActionKind::Search => {
                session
                    .search(action.params.query.as_deref().unwrap_or_default())
                    .await?;
                Ok(None)
            }
            ActionKind::ExtractContent => {
                let mut content = session.extract_content().await?;
                if let Some((idx, _)) = content.char_indices().nth(MAX_CONTENT_CHARS) {
                    content.truncate(idx);
                }
                Ok(Some(content))
            }
            // Done is intercepted by the loop; reaching here means the
            // planner combined it with other actions in the wrong order.
            ActionKind::Done => Err(AgentError::invalid_action(
                "done must be the only action in a step",
            )),
            ActionKind::Unknown => Err(AgentError::invalid_action(
                "unrecognized action kind",
            )),
        }
    }
}

/// Check kind-specific parameters before touching the browser.
fn validate(action: &AgentAction) -> Result<(), AgentError> {
    match action.kind {
        ActionKind::Navigate => {
            let url = action.params.url.as_deref().unwrap_or("");
            if url.is_empty() {
                return Err(AgentError::invalid_action("navigate requires a url"));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AgentError::invalid_action(format!(
                    "navigate url must be http(s): {url}"
                )));
            }
        }
        ActionKind::Click => {
            if action.element_index.is_none() {
                return Err(AgentError::invalid_action("click requires element_index"));
            }
        }
        ActionKind::TypeText => {
            if action.element_index.is_none() {
                return Err(AgentError::invalid_action("type_text requires element_index"));
            }
            if action.params.text.is_none() {
                return Err(AgentError::invalid_action("type_text requires text"));
            }
        }
        ActionKind::Select => {
            if action.element_index.is_none() || action.params.value.is_none() {
                return Err(AgentError::invalid_action(
                    "select requires element_index and value",
                ));
            }
        }
        ActionKind::Search => {
            if action.params.query.as_deref().unwrap_or("").trim().is_empty() {
                return Err(AgentError::invalid_action("search requires a query"));
            }
        }
        ActionKind::Scroll | ActionKind::Wait | ActionKind::ExtractContent | ActionKind::Done => {}
        ActionKind::Unknown => {
            return Err(AgentError::invalid_action("unrecognized action kind"));
        }
    }
    Ok(())
}
