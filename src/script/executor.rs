//! Script execution against a live page, composed with session bookkeeping.
//!
//! `execute_with_session` is the one call sites use: it asks the trigger
//! evaluator first, probes conditional triggers, runs the steps, records the
//! outcome in the session, and finishes with the post-execution condition
//! check. A failing script never takes the page test down with it.

use std::time::Instant;

use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::browser::PageDriver;
use crate::condition::{check_condition_violation, probe_condition};
use crate::script::types::{ExecutionOutcome, PageSetupScript, ScriptStep, Trigger, resolve_value};
use crate::session::{SessionManager, SessionResult, SkipReason, TriggerDecision};

/// Run one script against a page under the active session.
pub async fn execute_with_session(
    page: &dyn PageDriver,
    script: &PageSetupScript,
    page_id: &str,
    sessions: &mut SessionManager,
) -> SessionResult<ExecutionOutcome> {
    if sessions.current_session_id().is_none() {
        warn!(script = %script.id, "script execution requested without a session");
        return Ok(ExecutionOutcome::Skipped {
            reason: SkipReason::NoActiveSession,
        });
    }

    match sessions.should_execute(script) {
        TriggerDecision::Skip(reason) => {
            debug!(script = %script.id, %reason, "skipping script");
            return Ok(ExecutionOutcome::Skipped { reason });
        }
        TriggerDecision::Run => {}
    }

    if script.trigger == Trigger::Conditional {
        let Some(selector) = &script.condition_selector else {
            warn!(script = %script.id, "conditional script has no condition selector");
            return Ok(ExecutionOutcome::Skipped {
                reason: SkipReason::ConditionNotMet,
            });
        };
        if !probe_condition(page, selector).await {
            debug!(script = %script.id, selector, "condition not met, skipping");
            return Ok(ExecutionOutcome::Skipped {
                reason: SkipReason::ConditionNotMet,
            });
        }
    }

    let started = Instant::now();
    let error = run_steps(page, &script.steps).await.err();
    let success = error.is_none();
    let duration_ms = started.elapsed().as_millis() as u64;

    sessions
        .record_execution(&script.id, page_id, success, duration_ms)
        .await?;
    if let Err(stats_error) = sessions.store().update_script_stats(&script.id, success).await {
        warn!(script = %script.id, error = %stats_error, "failed to update script stats");
    }

    match &error {
        None => info!(script = %script.id, page = %page_id, duration_ms, "script executed"),
        Some(message) => {
            warn!(script = %script.id, page = %page_id, duration_ms, %message, "script failed")
        }
    }

    // Post-execution condition check: did the script actually make the
    // condition go away.
    let mut violation = None;
    if let Some(selector) = &script.condition_selector {
        let met = probe_condition(page, selector).await;
        violation = check_condition_violation(sessions, script, page_id, met).await?;
    }

    Ok(ExecutionOutcome::Executed {
        success,
        duration_ms,
        violation,
        error,
    })
}

/// Run steps in order, aborting on the first failure.
async fn run_steps(page: &dyn PageDriver, steps: &[ScriptStep]) -> Result<(), String> {
    for (index, step) in steps.iter().enumerate() {
        apply_step(page, step)
            .await
            .map_err(|message| format!("step {} ({}) failed: {}", index + 1, step.describe(), message))?;

        let wait = step.wait_after_ms();
        if wait > 0 {
            sleep(Duration::from_millis(wait)).await;
        }
    }
    Ok(())
}

async fn apply_step(page: &dyn PageDriver, step: &ScriptStep) -> Result<(), String> {
    let timeout_ms = step.timeout_ms();
    match step {
        ScriptStep::Click { selector, .. } => {
            page.wait_for_selector(selector, timeout_ms)
                .await
                .map_err(|e| e.to_string())?;
            page.click(selector).await.map_err(|e| e.to_string())
        }
        ScriptStep::Type { selector, value, .. } => {
            let resolved = resolve_value(value).map_err(|e| e.to_string())?;
            page.wait_for_selector(selector, timeout_ms)
                .await
                .map_err(|e| e.to_string())?;
            page.type_text(selector, &resolved)
                .await
                .map_err(|e| e.to_string())
        }
        ScriptStep::WaitForSelector { selector, .. } => page
            .wait_for_selector(selector, timeout_ms)
            .await
            .map_err(|e| e.to_string()),
        ScriptStep::WaitForNavigation { .. } => page
            .wait_for_navigation(timeout_ms)
            .await
            .map_err(|e| e.to_string()),
        ScriptStep::WaitForNetworkIdle { .. } => page
            .wait_for_network_idle(timeout_ms)
            .await
            .map_err(|e| e.to_string()),
        ScriptStep::Delay { duration_ms } => {
            sleep(Duration::from_millis(*duration_ms)).await;
            Ok(())
        }
    }
}
