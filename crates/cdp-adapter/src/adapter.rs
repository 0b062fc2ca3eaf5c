//! chromiumoxide-backed browser provider and session.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use webscout_agent::{
    AgentError, BrowserProvider, BrowserSession, PageState, ScrollDirection,
};

use crate::config::CdpConfig;
use crate::snapshot::{render_tree, snapshot_script, IndexedElement};

/// Owns the browser process (or attachment) and hands out page sessions.
pub struct CdpBrowser {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    config: CdpConfig,
}

impl CdpBrowser {
    /// Launch a browser or attach to an existing one per the config.
    pub async fn new(config: CdpConfig) -> Result<Self> {
        let (browser, handler_task) = match &config.cdp_url {
            Some(url) => {
                let ws_url = resolve_ws_url(url).await?;
                info!(%ws_url, "attaching to running browser over CDP");
                let (browser, handler) = Browser::connect(ws_url)
                    .await
                    .context("CDP attach failed")?;
                (browser, spawn_handler(handler))
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .window_size(config.viewport.0, config.viewport.1);
                if !config.headless {
                    builder = builder.with_head();
                }
                if config.disable_security {
                    builder = builder.no_sandbox();
                }
                if let Some(path) = &config.executable {
                    builder = builder.chrome_executable(path);
                }
                let browser_config = builder.build().map_err(|err| anyhow!(err))?;
                info!(headless = config.headless, "launching browser");
                let (browser, handler) = Browser::launch(browser_config)
                    .await
                    .context("browser launch failed")?;
                (browser, spawn_handler(handler))
            }
        };

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            config,
        })
    }

    /// Close the browser and stop the event pump. Idempotent enough to
    /// call from every shutdown path.
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            warn!(%err, "browser close failed");
        }
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserProvider for CdpBrowser {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AgentError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| AgentError::browser(format!("failed to open page: {err}")))?;
        debug!("opened new page session");
        Ok(Box::new(CdpSession {
            page,
            max_elements: self.config.max_elements,
            selectors: Arc::new(Mutex::new(HashMap::new())),
        }))
    }
}

/// One CDP page, exclusively owned by one agent run.
pub struct CdpSession {
    page: Page,
    max_elements: u32,
    /// Element index -> CSS selector, refreshed on every snapshot.
    selectors: Arc<Mutex<HashMap<u32, String>>>,
}

impl CdpSession {
    async fn selector_for(&self, index: u32) -> Result<String, AgentError> {
        let selectors = self.selectors.lock().await;
        selectors.get(&index).cloned().ok_or_else(|| {
            AgentError::execution(format!(
                "element [{index}] is not in the current snapshot; observe again"
            ))
        })
    }

    async fn settle(&self) {
        // Navigation-triggering interactions race the page load; a failed
        // wait just means no navigation happened.
        let _ = self.page.wait_for_navigation().await;
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn state(&self) -> Result<PageState, AgentError> {
        let url = self
            .page
            .url()
            .await
            .map_err(to_browser_err)?
            .unwrap_or_else(|| "about:blank".to_string());
        let title = self.page.get_title().await.map_err(to_browser_err)?;

        let elements: Vec<IndexedElement> = self
            .page
            .evaluate(snapshot_script(self.max_elements))
            .await
            .map_err(to_browser_err)?
            .into_value()
            .map_err(|err| AgentError::browser(format!("bad snapshot payload: {err}")))?;

        {
            let mut selectors = self.selectors.lock().await;
            selectors.clear();
            for element in &elements {
                selectors.insert(element.index, element.selector.clone());
            }
        }

        Ok(PageState {
            url,
            title,
            element_tree: render_tree(&elements),
            element_count: elements.len() as u32,
            screenshot_base64: None,
        })
    }

    async fn navigate(&self, url: &str) -> Result<(), AgentError> {
        self.page.goto(url).await.map_err(to_exec_err)?;
        self.settle().await;
        Ok(())
    }

    async fn click(&self, index: u32) -> Result<(), AgentError> {
        let selector = self.selector_for(index).await?;
        let element = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(to_exec_err)?;
        element.click().await.map_err(to_exec_err)?;
        self.settle().await;
        Ok(())
    }

    async fn type_text(&self, index: u32, text: &str, submit: bool) -> Result<(), AgentError> {
        let selector = self.selector_for(index).await?;
        let element = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(to_exec_err)?;
        element.click().await.map_err(to_exec_err)?;
        element.type_str(text).await.map_err(to_exec_err)?;
        if submit {
            element.press_key("Enter").await.map_err(to_exec_err)?;
            self.settle().await;
        }
        Ok(())
    }

    async fn select_option(&self, index: u32, value: &str) -> Result<(), AgentError> {
        let selector = self.selector_for(index).await?;
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
             el.value = {val}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            sel = serde_json::to_string(&selector).unwrap_or_default(),
            val = serde_json::to_string(value).unwrap_or_default(),
        );
        let found: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(to_exec_err)?
            .into_value()
            .map_err(|err| AgentError::execution(format!("select failed: {err}")))?;
        if !found {
            return Err(AgentError::execution(format!(
                "select target [{index}] no longer exists"
            )));
        }
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), AgentError> {
        let delta = match direction {
            ScrollDirection::Down => amount,
            ScrollDirection::Up => -amount,
        };
        self.page
            .evaluate(format!("window.scrollBy(0, {delta})"))
            .await
            .map_err(to_exec_err)?;
        Ok(())
    }

    async fn extract_content(&self) -> Result<String, AgentError> {
        self.page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(to_exec_err)?
            .into_value()
            .map_err(|err| AgentError::execution(format!("content extraction failed: {err}")))
    }

    async fn search(&self, query: &str) -> Result<(), AgentError> {
        let url = url::Url::parse_with_params("https://duckduckgo.com/html/", [("q", query)])
            .map_err(|err| AgentError::execution(format!("bad search query: {err}")))?;
        self.navigate(url.as_str()).await
    }

    async fn screenshot(&self) -> Result<Option<String>, AgentError> {
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(to_exec_err)?;
        Ok(Some(BASE64.encode(bytes)))
    }

    async fn close(&self) -> Result<(), AgentError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|err| AgentError::browser(format!("page close failed: {err}")))?;
        Ok(())
    }
}

fn spawn_handler(
    mut handler: chromiumoxide::handler::Handler,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

fn to_browser_err(err: chromiumoxide::error::CdpError) -> AgentError {
    AgentError::browser(err.to_string())
}

fn to_exec_err(err: chromiumoxide::error::CdpError) -> AgentError {
    AgentError::execution(err.to_string())
}

/// Resolve an `http(s)://` CDP debug endpoint to its websocket debugger
/// URL; `ws://` URLs pass through untouched.
async fn resolve_ws_url(cdp_url: &str) -> Result<String> {
    if cdp_url.starts_with("ws://") || cdp_url.starts_with("wss://") {
        return Ok(cdp_url.to_string());
    }

    let version_url = format!("{}/json/version", cdp_url.trim_end_matches('/'));
    let response: serde_json::Value = reqwest::get(&version_url)
        .await
        .with_context(|| format!("cannot reach CDP endpoint {version_url}"))?
        .json()
        .await
        .context("CDP version endpoint returned invalid JSON")?;

    response
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("CDP endpoint did not report webSocketDebuggerUrl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ws_urls_pass_through_unresolved() {
        let url = resolve_ws_url("ws://localhost:9222/devtools/browser/abc")
            .await
            .unwrap();
        assert_eq!(url, "ws://localhost:9222/devtools/browser/abc");
    }

    #[test]
    fn search_url_is_percent_encoded() {
        let url =
            url::Url::parse_with_params("https://duckduckgo.com/html/", [("q", "rust agents")])
                .unwrap();
        assert_eq!(url.as_str(), "https://duckduckgo.com/html/?q=rust+agents");
    }
}
