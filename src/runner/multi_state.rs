//! Multi-state page testing.
//!
//! Runs the accessibility check suite once per UI state: state 0 before any
//! qualifying setup script, then one more state after each qualifying
//! script. Repeated screenshot/evaluation sequences over a single automation
//! connection destabilize it, so the runner fully stops and restarts the
//! browser between states, re-navigates, and re-authenticates. That
//! stop/start/re-navigate unit is the state transition; skipping it is not
//! an optimization, it is how runs start losing their connection.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::auth::{Authenticator, LoginOutcome};
use crate::browser::{BrowserDriver, PageDriver, WaitStrategy};
use crate::checks::{CheckSuite, CheckSuiteError};
use crate::condition::{check_condition_violation, probe_condition};
use crate::config;
use crate::runner::types::{Finding, PageRollup, PageState, PageStatus, PageTestOutcome, TestResult};
use crate::script::{ExecutionOutcome, PageSetupScript, execute_with_session};
use crate::session::{SessionError, SessionManager, SkipReason};
use crate::store::{Store, StoreError};
use crate::wcag::{self, Level, TestingScope};

/// Warning code for a selector still visible after its script ran.
pub const WARN_EXPECTED_HIDDEN: &str = "WarnExpectedHiddenStillVisible";

/// Errors that abort a page's multi-state run
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The automation channel died and restarts did not bring it back
    #[error("browser connection lost: {0}")]
    ConnectionLost(String),

    /// Navigating to the page failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The check suite itself failed
    #[error("check suite failed: {0}")]
    Checks(String),

    /// Session bookkeeping failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Findings carried from a state transition into the next state's result.
#[derive(Debug, Default)]
struct PendingFindings {
    violations: Vec<Finding>,
    warnings: Vec<Finding>,
}

impl PendingFindings {
    fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.warnings.is_empty()
    }

    fn drain_into(&mut self, result: &mut TestResult) {
        result.violations.append(&mut self.violations);
        result.warnings.append(&mut self.warnings);
    }
}

/// Orchestrates session-aware, multi-state accessibility testing of pages.
///
/// One runner serves one website run at a time; the session it holds spans
/// all pages tested until `end_session` (or a different website) closes it.
pub struct MultiStateRunner<B: BrowserDriver> {
    browser: B,
    browser_running: bool,
    store: Arc<dyn Store>,
    checks: Arc<dyn CheckSuite>,
    auth: Option<Arc<dyn Authenticator>>,
    sessions: SessionManager,
    viewport: (u32, u32),
    scope: TestingScope,
    level: Level,
}

impl<B: BrowserDriver> MultiStateRunner<B> {
    pub fn new(browser: B, store: Arc<dyn Store>, checks: Arc<dyn CheckSuite>) -> Self {
        let settings = &config::get().browser;
        Self {
            browser,
            browser_running: false,
            sessions: SessionManager::new(store.clone()),
            store,
            checks,
            auth: None,
            viewport: (settings.viewport_width, settings.viewport_height),
            scope: TestingScope::new(),
            level: Level::AA,
        }
    }

    /// Authenticate before the first navigation and after every restart.
    pub fn with_authenticator(mut self, auth: Arc<dyn Authenticator>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Testing scope and conformance level used for the compliance counters.
    pub fn with_conformance(mut self, scope: TestingScope, level: Level) -> Self {
        self.scope = scope;
        self.level = level;
        self
    }

    /// Id of the session currently spanning this runner's pages, if any.
    pub fn current_session_id(&self) -> Option<&str> {
        self.sessions.current_session_id()
    }

    /// Close the session spanning the tested pages.
    pub async fn end_session(&mut self) -> Result<(), RunnerError> {
        self.sessions.end_session().await?;
        Ok(())
    }

    /// Test one page, producing one result per captured state.
    ///
    /// Returns every intended state, or a single diagnostic error result
    /// when the run aborts; never a silently truncated list.
    pub async fn test_page(
        &mut self,
        website_id: &str,
        page_id: &str,
        url: &str,
    ) -> Result<PageTestOutcome, RunnerError> {
        let scripts = self
            .store
            .get_scripts_for_page(page_id, website_id, true)
            .await?;

        // The session spans pages: only start one when none is open for
        // this website yet.
        if self.sessions.current_website_id() != Some(website_id) {
            self.sessions.start_session(website_id).await?;
        }

        let (qualifying, plain): (Vec<PageSetupScript>, Vec<PageSetupScript>) =
            scripts.into_iter().partition(|s| s.wants_multi_state());

        info!(
            page = %page_id,
            states = qualifying.len() + 1,
            setup_scripts = plain.len(),
            "testing page"
        );

        match self
            .run_states(website_id, page_id, url, &qualifying, &plain)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => self.fail_page(website_id, page_id, err).await,
        }
    }

    async fn run_states(
        &mut self,
        website_id: &str,
        page_id: &str,
        url: &str,
        qualifying: &[PageSetupScript],
        plain: &[PageSetupScript],
    ) -> Result<PageTestOutcome, RunnerError> {
        let (page, login) = self.open_page(url).await?;
        let mut pending = PendingFindings::default();
        let mut executed: Vec<String> = Vec::new();

        // Setup scripts without their own test states run before state 0;
        // whatever they observe lands in the initial state's result.
        for script in plain {
            self.run_script(&page, script, page_id, &mut pending, &mut executed)
                .await?;
        }

        let mut state_zero = PageState::initial();
        state_zero.scripts_executed = executed.clone();
        let mut results = vec![
            self.run_state_pass(&page, website_id, page_id, 0, state_zero, login, &mut pending)
                .await?,
        ];

        let mut page = page;
        for (index, script) in qualifying.iter().enumerate() {
            let state_sequence = (index + 1) as u32;
            self.run_script(&page, script, page_id, &mut pending, &mut executed)
                .await?;

            let (fresh_page, login) = self.restart_and_renavigate(url).await?;
            page = fresh_page;

            let result = self
                .run_state_pass(
                    &page,
                    website_id,
                    page_id,
                    state_sequence,
                    PageState::after_scripts(executed.clone()),
                    login,
                    &mut pending,
                )
                .await?;
            results.push(result);
        }

        link_related_results(&mut results);

        for result in &results {
            // Persistence failure here is equivalent to losing the browser:
            // the state's data cannot be dropped silently.
            self.store.create_test_result(result).await?;
        }

        let rollup = PageRollup::from_final_state(
            PageStatus::Tested,
            results.last().expect("at least state 0 exists"),
        );
        if let Err(rollup_error) = self.store.update_page_rollup(page_id, &rollup).await {
            warn!(page = %page_id, error = %rollup_error, "failed to update page rollup");
        }

        Ok(PageTestOutcome {
            status: PageStatus::Tested,
            results,
        })
    }

    /// Execute one script and collect what the next state needs to know.
    async fn run_script(
        &mut self,
        page: &B::Page,
        script: &PageSetupScript,
        page_id: &str,
        pending: &mut PendingFindings,
        executed: &mut Vec<String>,
    ) -> Result<(), RunnerError> {
        let outcome = execute_with_session(page, script, page_id, &mut self.sessions).await?;

        if let Some(violation) = outcome.violation() {
            pending.violations.push(violation.clone());
        }

        // A skipped-but-previously-executed script still gets its condition
        // probed: the banner coming back on a later page of the same session
        // is exactly the regression worth reporting.
        if let ExecutionOutcome::Skipped {
            reason: SkipReason::AlreadyExecutedThisSession,
        } = &outcome
        {
            if script.report_violation_if_condition_met {
                if let Some(selector) = &script.condition_selector {
                    let met = probe_condition(page, selector).await;
                    if let Some(violation) =
                        check_condition_violation(&mut self.sessions, script, page_id, met).await?
                    {
                        pending.violations.push(violation);
                    }
                }
            }
        }

        if !outcome.was_skipped() {
            executed.push(script.name.clone());

            for selector in &script.expect_hidden_after {
                if probe_condition(page, selector).await {
                    pending.warnings.push(
                        Finding::new(
                            WARN_EXPECTED_HIDDEN,
                            format!("\"{selector}\" is still visible after setup script ran"),
                        )
                        .selector(selector.clone())
                        .context(format!("script \"{}\" on page {}", script.name, page_id)),
                    );
                }
            }
        }

        // Liveness checkpoint: a dead channel here aborts the run before
        // another state is attempted against it.
        if !page.is_connected().await {
            return Err(RunnerError::ConnectionLost(
                "page stopped responding after script execution".to_string(),
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_state_pass(
        &self,
        page: &B::Page,
        website_id: &str,
        page_id: &str,
        state_sequence: u32,
        page_state: PageState,
        login: Option<LoginOutcome>,
        pending: &mut PendingFindings,
    ) -> Result<TestResult, RunnerError> {
        debug!(page = %page_id, state = state_sequence, "running accessibility pass");
        let raw = self
            .checks
            .run_all_checks(page)
            .await
            .map_err(|err| match err {
                CheckSuiteError::Driver(driver) if driver.is_connection_lost() => {
                    RunnerError::ConnectionLost(driver.to_string())
                }
                other => RunnerError::Checks(other.to_string()),
            })?;

        // Liveness checkpoint: results from a dead page are not trustworthy.
        if !page.is_connected().await {
            return Err(RunnerError::ConnectionLost(
                "page stopped responding after check pass".to_string(),
            ));
        }

        let mut result = TestResult::new(page_id, website_id, state_sequence, page_state);
        result.violations = raw.violations;
        result.warnings = raw.warnings;
        result.info = raw.info;
        result.discovery = raw.discovery;
        result.login = login;
        if !pending.is_empty() {
            pending.drain_into(&mut result);
        }

        let applicable = wcag::applicable_criteria(&self.scope, self.level);
        result.set_compliance(wcag::compliance_counts(&applicable, &result.reported_wcag()));

        Ok(result)
    }

    /// Start the browser (if needed), open a page, size it, authenticate,
    /// and navigate.
    async fn open_page(&mut self, url: &str) -> Result<(B::Page, Option<LoginOutcome>), RunnerError> {
        if !self.browser_running {
            self.browser
                .start()
                .await
                .map_err(|e| RunnerError::ConnectionLost(e.to_string()))?;
            self.browser_running = true;
        }

        let page = self
            .browser
            .new_page()
            .await
            .map_err(|e| RunnerError::ConnectionLost(e.to_string()))?;

        let (width, height) = self.viewport;
        page.set_viewport(width, height)
            .await
            .map_err(|e| RunnerError::ConnectionLost(e.to_string()))?;

        let mut login = None;
        if let Some(auth) = &self.auth {
            let outcome = auth.perform_login(&page, config::login_timeout_ms()).await;
            if !outcome.success {
                // Deliberate: testing proceeds logged-out, the result's
                // metadata records the failed attempt.
                warn!(error = ?outcome.error, "continuing without authentication");
            }
            login = Some(outcome);
        }

        page.goto(url, WaitStrategy::Load, config::nav_timeout_ms())
            .await
            .map_err(|e| RunnerError::Navigation(e.to_string()))?;

        Ok((page, login))
    }

    /// The state-transition unit: stop the browser, start it again, open a
    /// fresh page, re-authenticate, and re-navigate to the same URL.
    async fn restart_and_renavigate(
        &mut self,
        url: &str,
    ) -> Result<(B::Page, Option<LoginOutcome>), RunnerError> {
        let settings = &config::get().browser;
        let attempts = settings.restart_attempts.max(1);
        let settle = Duration::from_millis(settings.restart_settle_ms);

        let mut last_error = None;
        for attempt in 1..=attempts {
            if let Err(stop_error) = self.browser.stop().await {
                warn!(%stop_error, "browser stop failed, proceeding with restart");
            }
            self.browser_running = false;
            sleep(settle).await;

            match self.open_page(url).await {
                Ok(opened) => {
                    debug!(attempt, "browser restarted between states");
                    return Ok(opened);
                }
                Err(open_error) => {
                    warn!(attempt, error = %open_error, "browser restart attempt failed");
                    last_error = Some(open_error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RunnerError::ConnectionLost("browser restart failed".to_string())
        }))
    }

    /// Terminal path: persist a single diagnostic result and mark the page
    /// errored. Partial state lists are never returned.
    async fn fail_page(
        &mut self,
        website_id: &str,
        page_id: &str,
        err: RunnerError,
    ) -> Result<PageTestOutcome, RunnerError> {
        error!(page = %page_id, error = %err, "aborting page test");

        let result = TestResult::error_result(page_id, website_id, err.to_string());
        self.store.create_test_result(&result).await?;

        let rollup = PageRollup::from_final_state(PageStatus::Error, &result);
        if let Err(rollup_error) = self.store.update_page_rollup(page_id, &rollup).await {
            warn!(page = %page_id, error = %rollup_error, "failed to update page rollup");
        }

        Ok(PageTestOutcome {
            status: PageStatus::Error,
            results: vec![result],
        })
    }
}

/// Cross-link every state's `related_result_ids` with its siblings.
fn link_related_results(results: &mut [TestResult]) {
    let ids: Vec<String> = results.iter().map(|r| r.id.clone()).collect();
    for result in results.iter_mut() {
        result.related_result_ids = ids
            .iter()
            .filter(|id| **id != result.id)
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_related_results() {
        let mut results = vec![
            TestResult::new("p", "w", 0, PageState::initial()),
            TestResult::new("p", "w", 1, PageState::after_scripts(vec!["a".to_string()])),
            TestResult::new("p", "w", 2, PageState::after_scripts(vec!["a".into(), "b".into()])),
        ];
        link_related_results(&mut results);

        for result in &results {
            assert_eq!(result.related_result_ids.len(), 2);
            assert!(!result.related_result_ids.contains(&result.id));
        }
    }

    #[test]
    fn test_pending_findings_drain() {
        let mut pending = PendingFindings::default();
        pending.violations.push(Finding::new("a", "a"));
        pending.warnings.push(Finding::new("b", "b"));

        let mut result = TestResult::new("p", "w", 1, PageState::initial());
        pending.drain_into(&mut result);

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(pending.is_empty());
    }
}
