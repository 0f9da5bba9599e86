//! Scriptable in-memory browser for testing.
//!
//! `MockSite` models the site being tested: which selectors exist, what a
//! click does to them, and whether the automation channel is healthy. A
//! `MockBrowser` and its `MockPage`s share one `MockSite`, so scripted
//! behavior survives the stop/start/re-navigate cycle exactly like a real
//! site survives a browser restart.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{BrowserDriver, DriverError, PageDriver, WaitStrategy};

#[derive(Debug, Default)]
struct SiteState {
    /// Selectors currently present in the page
    present: HashSet<String>,
    /// Selectors re-inserted on every navigation (e.g. a cookie banner)
    reappear_on_goto: HashSet<String>,
    /// Clicking the key selector removes the value selector
    remove_on_click: HashMap<String, String>,
    /// Clicks that fail with a timeout
    fail_clicks: HashSet<String>,
    /// Automation channel is dead
    connection_lost: bool,
    /// Browser start calls fail
    fail_start: bool,
    /// Starts allowed before further ones fail (None = unlimited)
    starts_allowed: Option<u32>,
    /// Observed interactions
    navigations: Vec<String>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    starts: u32,
    stops: u32,
    viewport: Option<(u32, u32)>,
}

/// Shared scriptable model of the site under test.
#[derive(Debug, Clone, Default)]
pub struct MockSite {
    inner: Arc<Mutex<SiteState>>,
}

impl MockSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a site with an initial set of present selectors.
    pub fn with_selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let site = Self::new();
        {
            let mut state = site.inner.lock().unwrap();
            state.present = selectors.into_iter().map(Into::into).collect();
        }
        site
    }

    pub fn add_selector(&self, selector: &str) {
        self.inner.lock().unwrap().present.insert(selector.to_string());
    }

    pub fn remove_selector(&self, selector: &str) {
        self.inner.lock().unwrap().present.remove(selector);
    }

    pub fn has_selector(&self, selector: &str) -> bool {
        self.inner.lock().unwrap().present.contains(selector)
    }

    /// Make a selector come back on every navigation.
    pub fn reappear_on_goto(&self, selector: &str) {
        let mut state = self.inner.lock().unwrap();
        state.present.insert(selector.to_string());
        state.reappear_on_goto.insert(selector.to_string());
    }

    /// Stop a selector from reappearing on navigation.
    pub fn settle(&self, selector: &str) {
        self.inner.lock().unwrap().reappear_on_goto.remove(selector);
    }

    /// Clicking `click_selector` removes `removed_selector` from the page.
    pub fn dismiss_on_click(&self, click_selector: &str, removed_selector: &str) {
        self.inner
            .lock()
            .unwrap()
            .remove_on_click
            .insert(click_selector.to_string(), removed_selector.to_string());
    }

    /// Make clicks on a selector time out.
    pub fn fail_click(&self, selector: &str) {
        self.inner.lock().unwrap().fail_clicks.insert(selector.to_string());
    }

    /// Kill or restore the automation channel.
    pub fn set_connection_lost(&self, lost: bool) {
        self.inner.lock().unwrap().connection_lost = lost;
    }

    /// Make subsequent browser starts fail.
    pub fn set_fail_start(&self, fail: bool) {
        self.inner.lock().unwrap().fail_start = fail;
    }

    /// Allow only the first `n` browser starts to succeed.
    pub fn allow_starts(&self, n: u32) {
        self.inner.lock().unwrap().starts_allowed = Some(n);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.inner.lock().unwrap().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.inner.lock().unwrap().clicks.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().typed.clone()
    }

    pub fn starts(&self) -> u32 {
        self.inner.lock().unwrap().starts
    }

    pub fn stops(&self) -> u32 {
        self.inner.lock().unwrap().stops
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.inner.lock().unwrap().viewport
    }

    fn check_connection(&self) -> Result<(), DriverError> {
        if self.inner.lock().unwrap().connection_lost {
            Err(DriverError::ConnectionLost("mock channel closed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A page handle into a `MockSite`.
#[derive(Debug, Clone)]
pub struct MockPage {
    site: MockSite,
}

impl MockPage {
    pub fn new(site: MockSite) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &MockSite {
        &self.site
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str, _wait: WaitStrategy, _timeout_ms: u64) -> Result<(), DriverError> {
        self.site.check_connection()?;
        let mut state = self.site.inner.lock().unwrap();
        state.navigations.push(url.to_string());
        let reappearing: Vec<String> = state.reappear_on_goto.iter().cloned().collect();
        for selector in reappearing {
            state.present.insert(selector);
        }
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        self.site.check_connection()?;
        Ok(serde_json::Value::from(2))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.site.check_connection()?;
        let mut state = self.site.inner.lock().unwrap();
        if state.fail_clicks.contains(selector) {
            return Err(DriverError::Timeout {
                timeout_ms: 0,
                what: format!("click on {selector}"),
            });
        }
        if !state.present.contains(selector) {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        state.clicks.push(selector.to_string());
        if let Some(removed) = state.remove_on_click.get(selector).cloned() {
            state.present.remove(&removed);
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.site.check_connection()?;
        let mut state = self.site.inner.lock().unwrap();
        if !state.present.contains(selector) {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        state.typed.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        self.site.check_connection()?;
        if self.site.has_selector(selector) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                timeout_ms,
                what: format!("selector {selector}"),
            })
        }
    }

    async fn wait_for_navigation(&self, _timeout_ms: u64) -> Result<(), DriverError> {
        self.site.check_connection()
    }

    async fn wait_for_network_idle(&self, _timeout_ms: u64) -> Result<(), DriverError> {
        self.site.check_connection()
    }

    async fn selector_present(&self, selector: &str) -> Result<bool, DriverError> {
        self.site.check_connection()?;
        Ok(self.site.has_selector(selector))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.site.check_connection()?;
        // PNG signature, enough for consumers that sniff the format
        Ok(vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'])
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), DriverError> {
        self.site.check_connection()?;
        self.site.inner.lock().unwrap().viewport = Some((width, height));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.site.check_connection()?;
        let state = self.site.inner.lock().unwrap();
        Ok(state
            .navigations
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }
}

/// Browser driver over a `MockSite`.
#[derive(Debug)]
pub struct MockBrowser {
    site: MockSite,
    running: bool,
}

impl MockBrowser {
    pub fn new(site: MockSite) -> Self {
        Self { site, running: false }
    }

    pub fn site(&self) -> &MockSite {
        &self.site
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    type Page = MockPage;

    async fn start(&mut self) -> Result<(), DriverError> {
        let mut state = self.site.inner.lock().unwrap();
        if state.fail_start {
            return Err(DriverError::Lifecycle("mock start failure".to_string()));
        }
        if let Some(allowed) = state.starts_allowed {
            if state.starts >= allowed {
                return Err(DriverError::Lifecycle("mock start budget exhausted".to_string()));
            }
        }
        state.starts += 1;
        // A fresh browser process re-establishes the automation channel
        state.connection_lost = false;
        drop(state);
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DriverError> {
        self.site.inner.lock().unwrap().stops += 1;
        self.running = false;
        Ok(())
    }

    async fn new_page(&mut self) -> Result<MockPage, DriverError> {
        if !self.running {
            return Err(DriverError::Lifecycle("browser not started".to_string()));
        }
        self.site.check_connection()?;
        Ok(MockPage::new(self.site.clone()))
    }
}
