//! Chrome DevTools Protocol backend for WebScout.
//!
//! Implements the agent core's browser capability surface on top of
//! chromiumoxide: either launches a Chromium instance or attaches to an
//! already-running one through its CDP endpoint.

pub mod adapter;
pub mod config;
pub mod snapshot;

pub use adapter::{CdpBrowser, CdpSession};
pub use config::CdpConfig;
