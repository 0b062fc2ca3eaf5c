//! Browser capability surface.
//!
//! The loop depends only on these traits; the CDP implementation lives in
//! a separate crate. A session is exclusively owned by one agent run and
//! its navigation state intentionally persists across steps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::errors::AgentError;
use crate::types::ScrollDirection;

/// Snapshot of the current page, formatted for LLM consumption.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageState {
    /// Current page URL.
    pub url: String,

    /// Page title, when the document has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Indexed interactive elements, one per line:
    /// `[0]<button>Submit</button>`.
    pub element_tree: String,

    /// Number of indexed elements.
    pub element_count: u32,

    /// Base64 screenshot, attached only in vision mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
}

impl PageState {
    /// One-line summary used in history records and logs.
    pub fn summary(&self) -> String {
        match &self.title {
            Some(title) => format!("{} ({})", self.url, title),
            None => self.url.clone(),
        }
    }
}

/// Page-level primitives the loop executes actions against.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Observe the current page.
    async fn state(&self) -> Result<PageState, AgentError>;

    async fn navigate(&self, url: &str) -> Result<(), AgentError>;

    async fn click(&self, index: u32) -> Result<(), AgentError>;

    async fn type_text(&self, index: u32, text: &str, submit: bool) -> Result<(), AgentError>;

    async fn select_option(&self, index: u32, value: &str) -> Result<(), AgentError>;

    async fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), AgentError>;

    /// Readable text content of the current page.
    async fn extract_content(&self) -> Result<String, AgentError>;

    /// Run a web search for the query.
    async fn search(&self, query: &str) -> Result<(), AgentError>;

    /// Base64 PNG of the viewport, when the backend supports it.
    async fn screenshot(&self) -> Result<Option<String>, AgentError>;

    /// Release the underlying page. Must be called on every exit path of
    /// the owning scope; sessions left open leak browser processes.
    async fn close(&self) -> Result<(), AgentError>;
}

/// Session factory. One research round opens one session per query.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AgentError>;
}

/// Deterministic in-memory browser used for tests and offline development.
///
/// Records every primitive call and serves a fixed element tree. Clicks can
/// be scripted to fail to exercise the error path.
#[derive(Debug, Default)]
pub struct ScriptedBrowser {
    state: Mutex<PageState>,
    calls: Mutex<Vec<String>>,
    fail_clicks: bool,
    closed: Mutex<bool>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                title: None,
                element_tree: "[0]<a href=\"https://example.com\">Example</a>".to_string(),
                element_count: 1,
                screenshot_base64: None,
            }),
            ..Default::default()
        }
    }

    /// Every click returns an execution error.
    pub fn failing_clicks() -> Self {
        Self {
            fail_clicks: true,
            ..Self::new()
        }
    }

    /// Primitive calls made so far, as `"kind:detail"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BrowserSession for ScriptedBrowser {
    async fn state(&self) -> Result<PageState, AgentError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), AgentError> {
        self.record(format!("navigate:{url}"));
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.title = Some("Scripted page".to_string());
        Ok(())
    }

    async fn click(&self, index: u32) -> Result<(), AgentError> {
        self.record(format!("click:{index}"));
        if self.fail_clicks {
            return Err(AgentError::execution(format!(
                "element [{index}] is not clickable"
            )));
        }
        Ok(())
    }

    async fn type_text(&self, index: u32, text: &str, submit: bool) -> Result<(), AgentError> {
        self.record(format!("type_text:{index}:{text}:{submit}"));
        Ok(())
    }

    async fn select_option(&self, index: u32, value: &str) -> Result<(), AgentError> {
        self.record(format!("select:{index}:{value}"));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), AgentError> {
        self.record(format!("scroll:{direction:?}:{amount}"));
        Ok(())
    }

    async fn extract_content(&self) -> Result<String, AgentError> {
        self.record("extract_content".to_string());
        let state = self.state.lock().unwrap();
        Ok(format!("Scripted content of {}", state.url))
    }

    async fn search(&self, query: &str) -> Result<(), AgentError> {
        self.record(format!("search:{query}"));
        let mut state = self.state.lock().unwrap();
        state.url = format!("https://duckduckgo.com/html/?q={query}");
        state.title = Some(format!("{query} - search results"));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Option<String>, AgentError> {
        Ok(None)
    }

    async fn close(&self) -> Result<(), AgentError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Provider that hands out fresh [`ScriptedBrowser`] sessions.
#[derive(Debug, Default)]
pub struct ScriptedProvider;

#[async_trait]
impl BrowserProvider for ScriptedProvider {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AgentError> {
        Ok(Box::new(ScriptedBrowser::new()))
    }
}
