//! Types for page test results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::LoginOutcome;
use crate::wcag::ComplianceCounts;

/// A single finding reported against a page state.
///
/// Produced either by the accessibility check suite or by the session
/// condition checker (persistence violations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable finding code, e.g. "WarnCookieBannerPersists"
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Selector the finding is about, when applicable
    pub selector: Option<String>,

    /// Free-text context (script name, page, ...)
    pub context: Option<String>,

    /// WCAG criterion numbers the finding maps to
    #[serde(default)]
    pub wcag: Vec<String>,
}

impl Finding {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            selector: None,
            context: None,
            wcag: Vec::new(),
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn wcag(mut self, numbers: Vec<String>) -> Self {
        self.wcag = numbers;
        self
    }
}

/// Describes the UI state a test pass ran against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    /// Human-readable state description
    pub description: String,

    /// Names of the setup scripts executed to reach this state
    pub scripts_executed: Vec<String>,
}

impl PageState {
    /// The state before any qualifying script ran.
    pub fn initial() -> Self {
        Self {
            description: "initial state".to_string(),
            scripts_executed: Vec::new(),
        }
    }

    /// A state reached by executing the named scripts.
    pub fn after_scripts(scripts_executed: Vec<String>) -> Self {
        Self {
            description: format!("scripts executed: {}", scripts_executed.join(", ")),
            scripts_executed,
        }
    }
}

/// Result of one accessibility test pass over one page state.
///
/// Immutable once built; sibling states of the same page and session are
/// linked through `related_result_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Unique result id
    pub id: String,

    /// Page this result belongs to
    pub page_id: String,

    /// Website this result belongs to
    pub website_id: String,

    /// 0-based state number, strictly increasing within a page + session
    pub state_sequence: u32,

    /// The UI state this pass ran against
    pub page_state: PageState,

    /// Ids of the sibling state results for the same page + session
    #[serde(default)]
    pub related_result_ids: Vec<String>,

    /// Findings by severity bucket
    #[serde(default)]
    pub violations: Vec<Finding>,
    #[serde(default)]
    pub warnings: Vec<Finding>,
    #[serde(default)]
    pub info: Vec<Finding>,
    #[serde(default)]
    pub discovery: Vec<Finding>,

    /// Criteria applicable under the declared testing scope
    pub applicable_checks: u32,

    /// Applicable criteria with no reported issue
    pub passed_checks: u32,

    /// Applicable criteria matched by a reported issue
    pub failed_checks: u32,

    /// Diagnostic message when the run aborted in this state
    pub error: Option<String>,

    /// Outcome of the login attempt that preceded this state, if any
    pub login: Option<LoginOutcome>,

    /// Timestamp when the result was created
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl TestResult {
    /// Create an empty result for a page state.
    pub fn new(
        page_id: impl Into<String>,
        website_id: impl Into<String>,
        state_sequence: u32,
        page_state: PageState,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            page_id: page_id.into(),
            website_id: website_id.into(),
            state_sequence,
            page_state,
            related_result_ids: Vec::new(),
            violations: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
            discovery: Vec::new(),
            applicable_checks: 0,
            passed_checks: 0,
            failed_checks: 0,
            error: None,
            login: None,
            created_at: Utc::now(),
        }
    }

    /// Create the single diagnostic result persisted when a run aborts.
    pub fn error_result(
        page_id: impl Into<String>,
        website_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(
            page_id,
            website_id,
            0,
            PageState {
                description: "aborted".to_string(),
                scripts_executed: Vec::new(),
            },
        );
        result.error = Some(message.into());
        result
    }

    /// Apply compliance counters to this result.
    pub fn set_compliance(&mut self, counts: ComplianceCounts) {
        self.applicable_checks = counts.applicable;
        self.passed_checks = counts.passed;
        self.failed_checks = counts.failed;
    }

    /// WCAG numbers reported by this result's violations.
    pub fn reported_wcag(&self) -> Vec<String> {
        self.violations.iter().flat_map(|f| f.wcag.clone()).collect()
    }
}

/// Page status after a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Tested,
    Error,
}

/// Rollup counters pushed to the page record, taken from the final state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRollup {
    pub status: PageStatus,
    pub violations: u32,
    pub warnings: u32,
    pub info: u32,
    pub discovery: u32,
    pub applicable_checks: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_tested: DateTime<Utc>,
}

impl PageRollup {
    /// Build rollup counters from the final state's result.
    pub fn from_final_state(status: PageStatus, result: &TestResult) -> Self {
        Self {
            status,
            violations: result.violations.len() as u32,
            warnings: result.warnings.len() as u32,
            info: result.info.len() as u32,
            discovery: result.discovery.len() as u32,
            applicable_checks: result.applicable_checks,
            passed_checks: result.passed_checks,
            failed_checks: result.failed_checks,
            last_tested: result.created_at,
        }
    }
}

/// Outcome of testing one page: either every intended state, or a single
/// diagnostic error result. Never a silently truncated partial list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTestOutcome {
    pub status: PageStatus,
    pub results: Vec<TestResult>,
}

impl PageTestOutcome {
    pub fn is_error(&self) -> bool {
        self.status == PageStatus::Error
    }

    /// The final captured state, used for page rollups.
    pub fn final_state(&self) -> Option<&TestResult> {
        self.results.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_state_descriptions() {
        assert_eq!(PageState::initial().description, "initial state");
        let after = PageState::after_scripts(vec!["Dismiss Cookie Notice".to_string()]);
        assert_eq!(after.description, "scripts executed: Dismiss Cookie Notice");
        assert_eq!(after.scripts_executed.len(), 1);
    }

    #[test]
    fn test_error_result_is_single_state() {
        let result = TestResult::error_result("page-1", "site-1", "connection lost");
        assert_eq!(result.state_sequence, 0);
        assert_eq!(result.error.as_deref(), Some("connection lost"));
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_rollup_from_final_state() {
        let mut result = TestResult::new("page-1", "site-1", 2, PageState::initial());
        result.violations.push(Finding::new("ErrContrast", "low contrast"));
        result.applicable_checks = 50;
        result.passed_checks = 49;
        result.failed_checks = 1;

        let rollup = PageRollup::from_final_state(PageStatus::Tested, &result);
        assert_eq!(rollup.violations, 1);
        assert_eq!(rollup.failed_checks, 1);
        assert_eq!(rollup.status, PageStatus::Tested);
    }
}
