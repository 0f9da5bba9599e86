//! Persistence collaborator contract and the in-memory implementation.
//!
//! The production deployment backs this with a document database; the
//! orchestration core only depends on the `Store` trait. `MemoryStore`
//! serves tests and local dry runs, with failure injection for the
//! persistence error paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::{PageRollup, TestResult};
use crate::script::{PageSetupScript, ScriptScope};
use crate::session::ScriptExecutionSession;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced document does not exist
    #[error("document not found: {0}")]
    NotFound(String),

    /// Serializing a document failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend rejected the operation
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Execution statistics kept alongside a script definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStats {
    pub success_count: u32,
    pub failure_count: u32,
}

/// Minimal persistence contract required by the orchestration core.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a newly started session.
    async fn create_session(&self, session: &ScriptExecutionSession) -> Result<(), StoreError>;

    /// Persist the current state of a session after a mutation.
    async fn update_session(&self, session: &ScriptExecutionSession) -> Result<(), StoreError>;

    /// Scripts configured for a page, in declared order.
    async fn get_scripts_for_page(
        &self,
        page_id: &str,
        website_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<PageSetupScript>, StoreError>;

    /// Persist one state's test result.
    async fn create_test_result(&self, result: &TestResult) -> Result<(), StoreError>;

    /// Push rollup counters to the page record.
    async fn update_page_rollup(&self, page_id: &str, rollup: &PageRollup) -> Result<(), StoreError>;

    /// Bump a script's success/failure counters.
    async fn update_script_stats(&self, script_id: &str, success: bool) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct StoredScript {
    script: PageSetupScript,
    website_id: String,
    /// Pages a `ScriptScope::Page` script is assigned to
    page_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    sessions: HashMap<String, ScriptExecutionSession>,
    scripts: Vec<StoredScript>,
    results: Vec<TestResult>,
    rollups: HashMap<String, PageRollup>,
    stats: HashMap<String, ScriptStats>,
    fail_next_result_create: bool,
}

/// In-memory `Store` for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script for a website; `page_ids` only matters for
    /// page-scoped scripts.
    pub fn add_script(&self, website_id: &str, page_ids: &[&str], script: PageSetupScript) {
        self.inner.lock().unwrap().scripts.push(StoredScript {
            script,
            website_id: website_id.to_string(),
            page_ids: page_ids.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// All persisted sessions.
    pub fn sessions(&self) -> Vec<ScriptExecutionSession> {
        self.inner.lock().unwrap().sessions.values().cloned().collect()
    }

    /// A persisted session by id.
    pub fn session(&self, id: &str) -> Option<ScriptExecutionSession> {
        self.inner.lock().unwrap().sessions.get(id).cloned()
    }

    /// All persisted test results, in creation order.
    pub fn results(&self) -> Vec<TestResult> {
        self.inner.lock().unwrap().results.clone()
    }

    /// Rollup currently stored for a page.
    pub fn rollup(&self, page_id: &str) -> Option<PageRollup> {
        self.inner.lock().unwrap().rollups.get(page_id).cloned()
    }

    /// Execution stats for a script.
    pub fn stats(&self, script_id: &str) -> ScriptStats {
        self.inner
            .lock()
            .unwrap()
            .stats
            .get(script_id)
            .copied()
            .unwrap_or_default()
    }

    /// Make the next `create_test_result` fail.
    pub fn fail_next_result_create(&self) {
        self.inner.lock().unwrap().fail_next_result_create = true;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_session(&self, session: &ScriptExecutionSession) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &ScriptExecutionSession) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        if !state.sessions.contains_key(&session.id) {
            return Err(StoreError::NotFound(format!("session {}", session.id)));
        }
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_scripts_for_page(
        &self,
        page_id: &str,
        website_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<PageSetupScript>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .scripts
            .iter()
            .filter(|stored| stored.website_id == website_id)
            .filter(|stored| {
                stored.script.scope != ScriptScope::Page
                    || stored.page_ids.iter().any(|p| p == page_id)
            })
            .filter(|stored| !enabled_only || stored.script.enabled)
            .map(|stored| stored.script.clone())
            .collect())
    }

    async fn create_test_result(&self, result: &TestResult) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_next_result_create {
            state.fail_next_result_create = false;
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        state.results.push(result.clone());
        Ok(())
    }

    async fn update_page_rollup(&self, page_id: &str, rollup: &PageRollup) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .rollups
            .insert(page_id.to_string(), rollup.clone());
        Ok(())
    }

    async fn update_script_stats(&self, script_id: &str, success: bool) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let stats = state.stats.entry(script_id.to_string()).or_default();
        if success {
            stats.success_count += 1;
        } else {
            stats.failure_count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Trigger;

    fn script(id: &str) -> PageSetupScript {
        PageSetupScript::new(id, format!("script {id}"))
    }

    #[tokio::test]
    async fn test_scripts_filtered_by_website_and_page() {
        let store = MemoryStore::new();
        store.add_script("site-1", &[], script("a"));
        store.add_script(
            "site-1",
            &["page-1"],
            script("b").scope(ScriptScope::Page),
        );
        store.add_script("site-2", &[], script("c"));

        let page1 = store.get_scripts_for_page("page-1", "site-1", true).await.unwrap();
        assert_eq!(page1.len(), 2);

        let page2 = store.get_scripts_for_page("page-2", "site-1", true).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].id, "a");
    }

    #[tokio::test]
    async fn test_enabled_only_filter() {
        let store = MemoryStore::new();
        store.add_script("site-1", &[], script("a").disabled());

        assert!(store.get_scripts_for_page("p", "site-1", true).await.unwrap().is_empty());
        assert_eq!(store.get_scripts_for_page("p", "site-1", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_script_stats_accumulate() {
        let store = MemoryStore::new();
        store.update_script_stats("a", true).await.unwrap();
        store.update_script_stats("a", false).await.unwrap();
        store.update_script_stats("a", true).await.unwrap();

        let stats = store.stats("a");
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let session = ScriptExecutionSession::new("site-1");
        assert!(matches!(
            store.update_session(&session).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_result_write_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next_result_create();
        let result = TestResult::error_result("p", "s", "boom");
        assert!(store.create_test_result(&result).await.is_err());
        assert!(store.create_test_result(&result).await.is_ok());
    }

    #[test]
    fn test_trigger_is_part_of_script_defaults() {
        assert_eq!(script("a").trigger, Trigger::Always);
    }
}
