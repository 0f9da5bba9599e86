//! a11y-harness - Session-aware accessibility testing of live web pages.
//!
//! This crate provides:
//! - Script execution sessions with trigger evaluation (once per session,
//!   per page, conditional, always)
//! - A step-based setup script executor (click, type, waits) with
//!   `${ENV:NAME}` secret indirection
//! - Condition checking with persistence-violation reporting (e.g. a cookie
//!   banner that comes back after its dismissal script already ran)
//! - A multi-state test runner that restarts the browser between captured
//!   states for connection stability
//! - A subtractive WCAG applicability resolver feeding compliance scoring
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use a11y_harness::browser::{MockBrowser, MockSite};
//! use a11y_harness::checks::SelectorCheckSuite;
//! use a11y_harness::runner::{Finding, MultiStateRunner};
//! use a11y_harness::store::MemoryStore;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let site = MockSite::with_selectors([".cookie-banner", ".cookie-banner button"]);
//! let store = Arc::new(MemoryStore::new());
//! let checks = Arc::new(
//!     SelectorCheckSuite::new()
//!         .flag_violation(".cookie-banner", Finding::new("ErrOverlay", "banner blocks content")),
//! );
//!
//! let mut runner = MultiStateRunner::new(MockBrowser::new(site), store, checks);
//! let outcome = runner.test_page("site-1", "page-1", "https://example.com/").await?;
//! println!("{} states captured", outcome.results.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod browser;
pub mod checks;
pub mod condition;
pub mod config;
pub mod runner;
pub mod script;
pub mod session;
pub mod store;
pub mod wcag;

// Re-export runner types
pub use runner::{
    Finding, MultiStateRunner, PageRollup, PageState, PageStatus, PageTestOutcome, RunnerError,
    TestResult,
};

// Re-export script types and executor
pub use script::{
    ExecutionOutcome, PageSetupScript, ScriptScope, ScriptStep, Trigger, execute_with_session,
    resolve_value,
};

// Re-export session management
pub use session::{
    ScriptExecutionSession, SessionError, SessionManager, SkipReason, TriggerDecision,
};

// Re-export browser abstraction and mock backend
pub use browser::{
    BrowserDriver, DriverError, MockBrowser, MockPage, MockSite, PageDriver, WaitStrategy,
};

// Re-export collaborator contracts
pub use auth::{Authenticator, FormAuthenticator, LoginOutcome};
pub use checks::{CheckSuite, CheckSuiteError, RawCheckResults, SelectorCheckSuite};
pub use store::{MemoryStore, ScriptStats, Store, StoreError};

// Re-export the applicability resolver
pub use wcag::{
    ComplianceCounts, ContentCategory, Criterion, Level, TestingScope, applicable_criteria,
    compliance_counts,
};
