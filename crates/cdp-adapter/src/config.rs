//! Browser backend configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to obtain a browser and shape its pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpConfig {
    /// Attach to a running browser through this CDP endpoint instead of
    /// launching one. Accepts an `http://host:port` debug endpoint or a
    /// `ws://` debugger URL directly.
    pub cdp_url: Option<String>,

    /// Launch headless when no `cdp_url` is given.
    /// Default: true
    pub headless: bool,

    /// Disable the Chromium sandbox (needed in some containers).
    /// Default: false
    pub disable_security: bool,

    /// Viewport size for new pages.
    /// Default: 1280x1100
    pub viewport: (u32, u32),

    /// Explicit browser executable; autodetected when unset.
    pub executable: Option<PathBuf>,

    /// Maximum number of elements indexed per snapshot.
    /// Default: 200
    pub max_elements: u32,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            cdp_url: None,
            headless: true,
            disable_security: false,
            viewport: (1280, 1100),
            executable: None,
            max_elements: 200,
        }
    }
}

impl CdpConfig {
    /// Builder: attach to an existing browser.
    pub fn with_cdp_url(mut self, url: impl Into<String>) -> Self {
        self.cdp_url = Some(url.into());
        self
    }

    /// Builder: set headless mode.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Builder: toggle the security sandbox.
    pub fn disable_security(mut self, disable: bool) -> Self {
        self.disable_security = disable;
        self
    }
}
