//! Authentication collaborator.
//!
//! Login runs once before the first navigation and again after every forced
//! browser restart when the site requires a logged-in state. A failed login
//! never aborts testing; the outcome is recorded on the state's result so
//! report consumers can see the page was tested logged-out.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::PageDriver;
use crate::script::resolve_value;

/// Outcome of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl LoginOutcome {
    pub fn success(duration_ms: u64) -> Self {
        Self { success: true, error: None, duration_ms }
    }

    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// Performs a login against a live page.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn perform_login(&self, page: &dyn PageDriver, timeout_ms: u64) -> LoginOutcome;
}

/// Form-based login: type credentials into selectors and submit.
///
/// Credential values support the `${ENV:NAME}` indirection so secrets stay
/// out of stored configuration; resolved values are never logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormAuthenticator {
    /// Login page to navigate to first; `None` logs in on the current page
    pub login_url: Option<String>,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    pub username: String,
    pub password: String,
    /// Selector that must appear once the login succeeded
    pub success_selector: Option<String>,
}

impl FormAuthenticator {
    pub fn new(
        username_selector: impl Into<String>,
        password_selector: impl Into<String>,
        submit_selector: impl Into<String>,
    ) -> Self {
        Self {
            login_url: None,
            username_selector: username_selector.into(),
            password_selector: password_selector.into(),
            submit_selector: submit_selector.into(),
            username: String::new(),
            password: String::new(),
            success_selector: None,
        }
    }

    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn success_selector(mut self, selector: impl Into<String>) -> Self {
        self.success_selector = Some(selector.into());
        self
    }

    async fn attempt(&self, page: &dyn PageDriver, timeout_ms: u64) -> Result<(), String> {
        if let Some(url) = &self.login_url {
            page.goto(url, crate::browser::WaitStrategy::Load, timeout_ms)
                .await
                .map_err(|e| e.to_string())?;
        }

        let username = resolve_value(&self.username).map_err(|e| e.to_string())?;
        let password = resolve_value(&self.password).map_err(|e| e.to_string())?;

        page.wait_for_selector(&self.username_selector, timeout_ms)
            .await
            .map_err(|e| e.to_string())?;
        page.type_text(&self.username_selector, &username)
            .await
            .map_err(|e| e.to_string())?;
        page.type_text(&self.password_selector, &password)
            .await
            .map_err(|e| e.to_string())?;
        page.click(&self.submit_selector)
            .await
            .map_err(|e| e.to_string())?;
        page.wait_for_navigation(timeout_ms)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(selector) = &self.success_selector {
            page.wait_for_selector(selector, timeout_ms)
                .await
                .map_err(|e| format!("post-login selector never appeared: {e}"))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Authenticator for FormAuthenticator {
    async fn perform_login(&self, page: &dyn PageDriver, timeout_ms: u64) -> LoginOutcome {
        let started = Instant::now();
        let attempt = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.attempt(page, timeout_ms),
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match attempt {
            Ok(Ok(())) => {
                debug!(duration_ms, "login succeeded");
                LoginOutcome::success(duration_ms)
            }
            Ok(Err(error)) => {
                warn!(%error, "login failed, continuing without authentication");
                LoginOutcome::failure(error, duration_ms)
            }
            Err(_) => {
                warn!(timeout_ms, "login timed out, continuing without authentication");
                LoginOutcome::failure(format!("login timed out after {timeout_ms} ms"), duration_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockPage, MockSite};

    fn login_site() -> MockSite {
        MockSite::with_selectors(["#username", "#password", "#submit"])
    }

    #[tokio::test]
    async fn test_form_login_success() {
        let site = login_site();
        let page = MockPage::new(site.clone());
        let auth = FormAuthenticator::new("#username", "#password", "#submit")
            .credentials("auditor", "secret");

        let outcome = auth.perform_login(&page, 1_000).await;
        assert!(outcome.success);
        assert_eq!(site.clicks(), vec!["#submit".to_string()]);
        assert_eq!(site.typed().len(), 2);
    }

    #[tokio::test]
    async fn test_form_login_failure_is_reported_not_fatal() {
        let site = MockSite::new(); // no login form present
        let page = MockPage::new(site);
        let auth = FormAuthenticator::new("#username", "#password", "#submit")
            .credentials("auditor", "secret");

        let outcome = auth.perform_login(&page, 50).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_env_indirected_password_is_resolved() {
        let site = login_site();
        let page = MockPage::new(site.clone());
        unsafe { std::env::set_var("A11Y_TEST_LOGIN_PW", "hunter2") };
        let auth = FormAuthenticator::new("#username", "#password", "#submit")
            .credentials("auditor", "${ENV:A11Y_TEST_LOGIN_PW}");

        let outcome = auth.perform_login(&page, 1_000).await;
        assert!(outcome.success);
        assert!(site
            .typed()
            .iter()
            .any(|(sel, value)| sel == "#password" && value == "hunter2"));
    }
}
