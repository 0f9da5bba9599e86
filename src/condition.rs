//! Condition checking and persistence-violation emission.
//!
//! A condition selector marks something a setup script is meant to make go
//! away (a cookie banner, an overlay). Seeing it *before* the script has
//! ever run is expected; seeing it again *after* the script ran this
//! session is a persistence violation worth reporting.

use tracing::{debug, warn};

use crate::browser::PageDriver;
use crate::runner::Finding;
use crate::script::PageSetupScript;
use crate::session::{SessionManager, SessionResult};

/// Finding code used when the script does not configure its own.
pub const DEFAULT_VIOLATION_CODE: &str = "WarnConditionPersists";

/// Finding message used when the script does not configure its own.
pub const DEFAULT_VIOLATION_MESSAGE: &str =
    "A condition the setup script dismisses is present again";

/// Probe a selector on the live page.
///
/// Probe failures (disconnected page, bad selector) are treated as
/// "condition not met": the probe must never take the page test down.
pub async fn probe_condition(page: &dyn PageDriver, selector: &str) -> bool {
    match page.selector_present(selector).await {
        Ok(present) => present,
        Err(error) => {
            warn!(selector, %error, "condition probe failed, treating as not met");
            false
        }
    }
}

/// Record a condition observation and emit a persistence violation when the
/// condition is met even though the script already ran this session.
///
/// Every page where that happens produces its own violation instance; there
/// is deliberately no per-session deduplication.
pub async fn check_condition_violation(
    sessions: &mut SessionManager,
    script: &PageSetupScript,
    page_id: &str,
    condition_met: bool,
) -> SessionResult<Option<Finding>> {
    let selector = script.condition_selector.clone().unwrap_or_default();
    sessions
        .record_condition_check(&script.id, page_id, &selector, condition_met)
        .await?;

    if !condition_met || !script.report_violation_if_condition_met {
        return Ok(None);
    }

    if !sessions.has_executed(&script.id) {
        // Condition exists but the script has never run: expected, not a
        // regression.
        debug!(script = %script.id, page = %page_id, "condition present before first execution");
        return Ok(None);
    }

    sessions.flag_condition_violation(&script.id, page_id).await?;

    let finding = Finding::new(
        script
            .violation_code
            .clone()
            .unwrap_or_else(|| DEFAULT_VIOLATION_CODE.to_string()),
        script
            .violation_message
            .clone()
            .unwrap_or_else(|| DEFAULT_VIOLATION_MESSAGE.to_string()),
    )
    .selector(selector.clone())
    .context(format!(
        "setup script \"{}\" already ran this session, but \"{}\" is present again on page {}",
        script.name, selector, page_id
    ));

    warn!(
        script = %script.id,
        page = %page_id,
        selector,
        code = %finding.code,
        "condition persists after script execution"
    );
    Ok(Some(finding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockPage, MockSite};
    use crate::script::Trigger;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn cookie_script() -> PageSetupScript {
        PageSetupScript::new("cookie", "Dismiss Cookie Notice")
            .trigger(Trigger::OncePerSession)
            .condition(".cookie-banner")
            .report_violation("WarnCookieBannerPersists", "Cookie banner reappeared")
    }

    async fn manager_with_session() -> SessionManager {
        let mut sessions = SessionManager::new(Arc::new(MemoryStore::new()));
        sessions.start_session("site-1").await.unwrap();
        sessions
    }

    #[tokio::test]
    async fn test_condition_before_first_execution_is_expected() {
        let mut sessions = manager_with_session().await;
        let script = cookie_script();

        let finding = check_condition_violation(&mut sessions, &script, "page-a", true)
            .await
            .unwrap();
        assert!(finding.is_none());
    }

    #[tokio::test]
    async fn test_condition_after_execution_is_a_violation() {
        let mut sessions = manager_with_session().await;
        let script = cookie_script();
        sessions.record_execution("cookie", "page-a", true, 80).await.unwrap();

        let finding = check_condition_violation(&mut sessions, &script, "page-b", true)
            .await
            .unwrap()
            .expect("violation expected");
        assert_eq!(finding.code, "WarnCookieBannerPersists");
        assert_eq!(finding.selector.as_deref(), Some(".cookie-banner"));
    }

    #[tokio::test]
    async fn test_condition_absent_after_execution_is_clean() {
        let mut sessions = manager_with_session().await;
        let script = cookie_script();
        sessions.record_execution("cookie", "page-a", true, 80).await.unwrap();

        let finding = check_condition_violation(&mut sessions, &script, "page-c", false)
            .await
            .unwrap();
        assert!(finding.is_none());
    }

    #[tokio::test]
    async fn test_every_affected_page_reports_its_own_violation() {
        let mut sessions = manager_with_session().await;
        let script = cookie_script();
        sessions.record_execution("cookie", "page-a", true, 80).await.unwrap();

        for page in ["page-b", "page-c", "page-d"] {
            let finding = check_condition_violation(&mut sessions, &script, page, true)
                .await
                .unwrap();
            assert!(finding.is_some(), "expected a violation on {page}");
        }
    }

    #[tokio::test]
    async fn test_checks_are_recorded_with_reported_flag() {
        let store = Arc::new(MemoryStore::new());
        let mut sessions = SessionManager::new(store.clone());
        let id = sessions.start_session("site-1").await.unwrap();
        let script = cookie_script();

        check_condition_violation(&mut sessions, &script, "page-a", true).await.unwrap();
        sessions.record_execution("cookie", "page-a", true, 80).await.unwrap();
        check_condition_violation(&mut sessions, &script, "page-b", true).await.unwrap();

        let session = store.session(&id).unwrap();
        assert_eq!(session.condition_checks.len(), 2);
        assert!(!session.condition_checks[0].violation_reported);
        assert!(session.condition_checks[1].violation_reported);
    }

    #[tokio::test]
    async fn test_no_violation_when_reporting_disabled() {
        let mut sessions = manager_with_session().await;
        let script = PageSetupScript::new("cookie", "Dismiss Cookie Notice")
            .condition(".cookie-banner");
        sessions.record_execution("cookie", "page-a", true, 80).await.unwrap();

        let finding = check_condition_violation(&mut sessions, &script, "page-b", true)
            .await
            .unwrap();
        assert!(finding.is_none());
    }

    #[tokio::test]
    async fn test_probe_failure_is_not_met() {
        let site = MockSite::new();
        site.set_connection_lost(true);
        let page = MockPage::new(site);
        assert!(!probe_condition(&page, ".cookie-banner").await);
    }
}
