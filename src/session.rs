//! Script execution sessions and the trigger evaluator.
//!
//! A session is the scope across which "once per session" triggers are
//! tracked; it is bound to one website's test run. The manager holds the
//! single active session as an explicit handle (no global state), mutates
//! it serially within one page-test flow, and persists synchronously after
//! every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::script::{PageSetupScript, Trigger};
use crate::store::{Store, StoreError};

/// One script execution within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub script_id: String,
    pub page_id: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

/// One condition observation within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheck {
    pub script_id: String,
    pub page_id: String,
    pub selector: String,
    pub condition_met: bool,
    pub violation_reported: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

/// Durable record of one website's test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptExecutionSession {
    pub id: String,
    pub website_id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub executions: Vec<ExecutionRecord>,
    #[serde(default)]
    pub condition_checks: Vec<ConditionCheck>,
}

impl ScriptExecutionSession {
    pub fn new(website_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            website_id: website_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            executions: Vec::new(),
            condition_checks: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors from session bookkeeping
#[derive(Debug, Error)]
pub enum SessionError {
    /// A mutation was attempted with no session open
    #[error("no active session")]
    NoActiveSession,

    /// Persisting the session failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a script was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    AlreadyExecutedThisSession,
    ConditionNotMet,
    NoActiveSession,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::AlreadyExecutedThisSession => write!(f, "already executed this session"),
            SkipReason::ConditionNotMet => write!(f, "condition not met"),
            SkipReason::NoActiveSession => write!(f, "no active session"),
        }
    }
}

/// Trigger evaluator verdict for one script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Run,
    Skip(SkipReason),
}

/// Holds the active session and evaluates script triggers against it.
///
/// One manager serves one website's test run at a time; starting a session
/// for a different website ends the open one first.
pub struct SessionManager {
    store: Arc<dyn Store>,
    current: Option<ScriptExecutionSession>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, current: None }
    }

    /// The persistence handle this manager writes through.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Open a new session for a website and persist it.
    ///
    /// Any session still open is ended first; session boundaries follow the
    /// caller's website order.
    pub async fn start_session(&mut self, website_id: &str) -> SessionResult<String> {
        if let Some(open) = &self.current {
            warn!(
                open_session = %open.id,
                open_website = %open.website_id,
                new_website = %website_id,
                "starting a session while one is open, ending the previous one"
            );
            self.end_session().await?;
        }

        let session = ScriptExecutionSession::new(website_id);
        self.store.create_session(&session).await?;
        let id = session.id.clone();
        debug!(session = %id, website = %website_id, "session started");
        self.current = Some(session);
        Ok(id)
    }

    /// Stamp the end time, persist, and clear the active session.
    ///
    /// Ending is terminal: no further mutation is valid afterwards.
    pub async fn end_session(&mut self) -> SessionResult<()> {
        let Some(mut session) = self.current.take() else {
            return Ok(());
        };
        session.ended_at = Some(Utc::now());
        self.store.update_session(&session).await?;
        debug!(session = %session.id, "session ended");
        Ok(())
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.id.as_str())
    }

    pub fn current_website_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.website_id.as_str())
    }

    /// Whether a script has an execution record in the active session.
    pub fn has_executed(&self, script_id: &str) -> bool {
        self.current
            .as_ref()
            .map(|s| s.executions.iter().any(|r| r.script_id == script_id))
            .unwrap_or(false)
    }

    /// Trigger state machine: should this script run now.
    ///
    /// Conditional scripts get a `Run` here; the presence probe for their
    /// condition selector happens in the executor against the live page.
    pub fn should_execute(&self, script: &PageSetupScript) -> TriggerDecision {
        if !script.enabled {
            return TriggerDecision::Skip(SkipReason::Disabled);
        }
        match script.trigger {
            Trigger::OncePerSession if self.has_executed(&script.id) => {
                TriggerDecision::Skip(SkipReason::AlreadyExecutedThisSession)
            }
            Trigger::OncePerSession
            | Trigger::OncePerPage
            | Trigger::Conditional
            | Trigger::Always => TriggerDecision::Run,
        }
    }

    /// Append an execution record and persist immediately.
    pub async fn record_execution(
        &mut self,
        script_id: &str,
        page_id: &str,
        success: bool,
        duration_ms: u64,
    ) -> SessionResult<()> {
        let session = self.current.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.executions.push(ExecutionRecord {
            script_id: script_id.to_string(),
            page_id: page_id.to_string(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
        self.store.update_session(session).await?;
        Ok(())
    }

    /// Append a condition observation and persist immediately.
    pub async fn record_condition_check(
        &mut self,
        script_id: &str,
        page_id: &str,
        selector: &str,
        condition_met: bool,
    ) -> SessionResult<()> {
        let session = self.current.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.condition_checks.push(ConditionCheck {
            script_id: script_id.to_string(),
            page_id: page_id.to_string(),
            selector: selector.to_string(),
            condition_met,
            violation_reported: false,
            timestamp: Utc::now(),
        });
        self.store.update_session(session).await?;
        Ok(())
    }

    /// Mark the most recent condition check for (script, page) as reported
    /// and persist.
    pub async fn flag_condition_violation(
        &mut self,
        script_id: &str,
        page_id: &str,
    ) -> SessionResult<()> {
        let session = self.current.as_mut().ok_or(SessionError::NoActiveSession)?;
        if let Some(check) = session
            .condition_checks
            .iter_mut()
            .rev()
            .find(|c| c.script_id == script_id && c.page_id == page_id)
        {
            check.violation_reported = true;
        }
        self.store.update_session(session).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager() -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionManager::new(store.clone()), store)
    }

    fn once_per_session(id: &str) -> PageSetupScript {
        PageSetupScript::new(id, "Dismiss Cookie Notice").trigger(Trigger::OncePerSession)
    }

    #[tokio::test]
    async fn test_once_per_session_skips_after_execution() {
        let (mut sessions, _store) = manager();
        sessions.start_session("site-1").await.unwrap();
        let script = once_per_session("cookie");

        assert_eq!(sessions.should_execute(&script), TriggerDecision::Run);
        sessions.record_execution("cookie", "page-1", true, 120).await.unwrap();
        assert_eq!(
            sessions.should_execute(&script),
            TriggerDecision::Skip(SkipReason::AlreadyExecutedThisSession)
        );
    }

    #[tokio::test]
    async fn test_new_session_rearms_once_per_session() {
        let (mut sessions, _store) = manager();
        sessions.start_session("site-1").await.unwrap();
        sessions.record_execution("cookie", "page-1", true, 120).await.unwrap();
        sessions.end_session().await.unwrap();

        sessions.start_session("site-1").await.unwrap();
        let script = once_per_session("cookie");
        assert_eq!(sessions.should_execute(&script), TriggerDecision::Run);
    }

    #[tokio::test]
    async fn test_disabled_script_is_skipped() {
        let (mut sessions, _store) = manager();
        sessions.start_session("site-1").await.unwrap();
        let script = once_per_session("cookie").disabled();
        assert_eq!(
            sessions.should_execute(&script),
            TriggerDecision::Skip(SkipReason::Disabled)
        );
    }

    #[tokio::test]
    async fn test_always_and_conditional_run_even_after_execution() {
        let (mut sessions, _store) = manager();
        sessions.start_session("site-1").await.unwrap();
        sessions.record_execution("s", "page-1", true, 10).await.unwrap();

        let always = PageSetupScript::new("s", "s").trigger(Trigger::Always);
        let conditional = PageSetupScript::new("s", "s").trigger(Trigger::Conditional);
        assert_eq!(sessions.should_execute(&always), TriggerDecision::Run);
        assert_eq!(sessions.should_execute(&conditional), TriggerDecision::Run);
    }

    #[tokio::test]
    async fn test_ending_is_terminal() {
        let (mut sessions, _store) = manager();
        sessions.start_session("site-1").await.unwrap();
        sessions.end_session().await.unwrap();

        assert!(sessions.current_session_id().is_none());
        assert!(matches!(
            sessions.record_execution("s", "p", true, 1).await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_starting_for_new_website_ends_open_session() {
        let (mut sessions, store) = manager();
        let first = sessions.start_session("site-1").await.unwrap();
        let second = sessions.start_session("site-2").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(sessions.current_website_id(), Some("site-2"));
        let ended = store.session(&first).unwrap();
        assert!(ended.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_mutations_persist_immediately() {
        let (mut sessions, store) = manager();
        let id = sessions.start_session("site-1").await.unwrap();
        sessions.record_execution("cookie", "page-1", false, 42).await.unwrap();

        let persisted = store.session(&id).unwrap();
        assert_eq!(persisted.executions.len(), 1);
        assert!(!persisted.executions[0].success);
        assert_eq!(persisted.executions[0].duration_ms, 42);
    }
}
