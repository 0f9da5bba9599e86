//! Browser automation abstraction.
//!
//! This module provides a unified interface over browser drivers:
//! - `PageDriver` for interaction with a single live page
//! - `BrowserDriver` for the stop/start/create-page lifecycle used by the
//!   restart-between-states policy
//! - `MockBrowser` / `MockPage` for testing without a real browser
//!
//! Every method is a suspension point with an explicit timeout; nothing in
//! this crate blocks a worker thread for the duration of a network wait.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::{MockBrowser, MockPage, MockSite};

/// Errors surfaced by browser drivers
#[derive(Debug, Error)]
pub enum DriverError {
    /// Navigation to a URL failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A wait ran out of time
    #[error("timed out after {timeout_ms} ms waiting for {what}")]
    Timeout { timeout_ms: u64, what: String },

    /// A selector matched nothing
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// In-page script evaluation failed
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The automation channel to the browser is gone
    #[error("browser connection lost: {0}")]
    ConnectionLost(String),

    /// Browser process lifecycle error (start/stop/new page)
    #[error("browser lifecycle error: {0}")]
    Lifecycle(String),
}

impl DriverError {
    /// Whether this error means the automation channel itself is dead.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, DriverError::ConnectionLost(_))
    }
}

/// Wait strategy for navigations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Resolve on the load event
    Load,
    /// Resolve on DOMContentLoaded
    DomContentLoaded,
    /// Resolve when the network has been idle
    NetworkIdle,
}

/// Interaction surface for a single live page.
///
/// Implementations wrap a real automation channel (CDP, WebDriver); the
/// in-crate `MockPage` backs the test suite.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL.
    async fn goto(&self, url: &str, wait: WaitStrategy, timeout_ms: u64) -> Result<(), DriverError>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Click the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Type a value into the first element matching the selector.
    async fn type_text(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// Wait for a selector to be present.
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError>;

    /// Wait for an in-flight navigation to finish.
    async fn wait_for_navigation(&self, timeout_ms: u64) -> Result<(), DriverError>;

    /// Wait for the network to go idle.
    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<(), DriverError>;

    /// Probe whether a selector currently matches anything.
    async fn selector_present(&self, selector: &str) -> Result<bool, DriverError>;

    /// Capture a screenshot of the current viewport (PNG bytes).
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Resize the viewport.
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), DriverError>;

    /// URL the page is currently on.
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Liveness probe: an evaluate round-trip that must come back.
    async fn is_connected(&self) -> bool {
        self.evaluate("1 + 1").await.is_ok()
    }
}

/// Browser process lifecycle.
///
/// `stop` followed by `start` and `new_page` is the unit the multi-state
/// runner uses as its state-transition boundary.
#[async_trait]
pub trait BrowserDriver: Send {
    type Page: PageDriver;

    /// Launch the browser process.
    async fn start(&mut self) -> Result<(), DriverError>;

    /// Stop the browser process, tearing down all pages.
    async fn stop(&mut self) -> Result<(), DriverError>;

    /// Open a fresh page in the running browser.
    async fn new_page(&mut self) -> Result<Self::Page, DriverError>;
}
