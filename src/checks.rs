//! Accessibility check suite collaborator.
//!
//! The suite itself is opaque to the orchestrator: one call per page state,
//! raw findings back. `SelectorCheckSuite` is the in-crate implementation
//! used by tests and dry runs; it reports configured findings whenever their
//! selector is present, which makes its output state-dependent the same way
//! a real DOM check suite's is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::browser::{DriverError, PageDriver};
use crate::runner::Finding;

/// Errors from a check suite pass
#[derive(Debug, Error)]
pub enum CheckSuiteError {
    /// The suite itself failed
    #[error("check suite failed: {0}")]
    Failed(String),

    /// The underlying page interaction failed
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Raw findings from one pass of the full check suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCheckResults {
    #[serde(default)]
    pub violations: Vec<Finding>,
    #[serde(default)]
    pub warnings: Vec<Finding>,
    #[serde(default)]
    pub info: Vec<Finding>,
    #[serde(default)]
    pub discovery: Vec<Finding>,
}

/// Severity bucket a finding lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Violation,
    Warning,
    Info,
    Discovery,
}

/// Runs the full accessibility check suite against a live page.
#[async_trait]
pub trait CheckSuite: Send + Sync {
    async fn run_all_checks(&self, page: &dyn PageDriver) -> Result<RawCheckResults, CheckSuiteError>;
}

/// A rule for `SelectorCheckSuite`: report `finding` at `severity` whenever
/// `selector` matches something on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorRule {
    pub selector: String,
    pub severity: Severity,
    pub finding: Finding,
}

/// Minimal selector-driven check suite.
#[derive(Debug, Clone, Default)]
pub struct SelectorCheckSuite {
    rules: Vec<SelectorRule>,
}

impl SelectorCheckSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a violation whenever `selector` is present.
    pub fn flag_violation(mut self, selector: impl Into<String>, finding: Finding) -> Self {
        self.rules.push(SelectorRule {
            selector: selector.into(),
            severity: Severity::Violation,
            finding,
        });
        self
    }

    /// Report a warning whenever `selector` is present.
    pub fn flag_warning(mut self, selector: impl Into<String>, finding: Finding) -> Self {
        self.rules.push(SelectorRule {
            selector: selector.into(),
            severity: Severity::Warning,
            finding,
        });
        self
    }

    pub fn rule(mut self, rule: SelectorRule) -> Self {
        self.rules.push(rule);
        self
    }
}

#[async_trait]
impl CheckSuite for SelectorCheckSuite {
    async fn run_all_checks(&self, page: &dyn PageDriver) -> Result<RawCheckResults, CheckSuiteError> {
        let mut results = RawCheckResults::default();
        for rule in &self.rules {
            if page.selector_present(&rule.selector).await? {
                let finding = rule.finding.clone();
                match rule.severity {
                    Severity::Violation => results.violations.push(finding),
                    Severity::Warning => results.warnings.push(finding),
                    Severity::Info => results.info.push(finding),
                    Severity::Discovery => results.discovery.push(finding),
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockPage, MockSite};

    #[tokio::test]
    async fn test_selector_suite_reports_present_selectors_only() {
        let site = MockSite::with_selectors(["img.hero"]);
        let page = MockPage::new(site);

        let suite = SelectorCheckSuite::new()
            .flag_violation(
                "img.hero",
                Finding::new("ErrMissingAlt", "image without alt text").wcag(vec!["1.1.1".to_string()]),
            )
            .flag_violation("video.banner", Finding::new("ErrNoCaptions", "video without captions"));

        let results = suite.run_all_checks(&page).await.unwrap();
        assert_eq!(results.violations.len(), 1);
        assert_eq!(results.violations[0].code, "ErrMissingAlt");
    }

    #[tokio::test]
    async fn test_driver_error_propagates() {
        let site = MockSite::new();
        site.set_connection_lost(true);
        let page = MockPage::new(site);

        let suite = SelectorCheckSuite::new()
            .flag_violation("#x", Finding::new("ErrX", "x"));
        assert!(suite.run_all_checks(&page).await.is_err());
    }
}
