//! Page setup script descriptors.
//!
//! Scripts are configured out-of-band (editor UI, seed data) and read-only
//! to the orchestrator. Steps form a closed variant type, each carrying only
//! the fields its action needs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;
use crate::runner::Finding;
use crate::session::SkipReason;

/// How widely a script applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptScope {
    Website,
    Page,
    TestRun,
}

/// How often a script executes relative to the session and page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    OncePerSession,
    OncePerPage,
    Conditional,
    Always,
}

/// One browser action within a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    Click {
        selector: String,
        timeout_ms: Option<u64>,
        wait_after_ms: Option<u64>,
    },
    Type {
        selector: String,
        /// Literal text, or `${ENV:NAME}` resolved at execution time
        value: String,
        timeout_ms: Option<u64>,
        wait_after_ms: Option<u64>,
    },
    WaitForSelector {
        selector: String,
        timeout_ms: Option<u64>,
        wait_after_ms: Option<u64>,
    },
    WaitForNavigation {
        timeout_ms: Option<u64>,
        wait_after_ms: Option<u64>,
    },
    WaitForNetworkIdle {
        timeout_ms: Option<u64>,
        wait_after_ms: Option<u64>,
    },
    Delay {
        duration_ms: u64,
    },
}

impl ScriptStep {
    /// Convenience constructor for a click step.
    pub fn click(selector: impl Into<String>) -> Self {
        ScriptStep::Click {
            selector: selector.into(),
            timeout_ms: None,
            wait_after_ms: None,
        }
    }

    /// Convenience constructor for a type step.
    pub fn type_into(selector: impl Into<String>, value: impl Into<String>) -> Self {
        ScriptStep::Type {
            selector: selector.into(),
            value: value.into(),
            timeout_ms: None,
            wait_after_ms: None,
        }
    }

    /// Convenience constructor for a wait-for-selector step.
    pub fn wait_for(selector: impl Into<String>) -> Self {
        ScriptStep::WaitForSelector {
            selector: selector.into(),
            timeout_ms: None,
            wait_after_ms: None,
        }
    }

    /// Effective timeout for this step, falling back to configured defaults.
    pub fn timeout_ms(&self) -> u64 {
        let configured = match self {
            ScriptStep::Click { timeout_ms, .. }
            | ScriptStep::Type { timeout_ms, .. }
            | ScriptStep::WaitForSelector { timeout_ms, .. } => *timeout_ms,
            ScriptStep::WaitForNavigation { timeout_ms, .. } => {
                return timeout_ms.unwrap_or_else(config::nav_timeout_ms);
            }
            ScriptStep::WaitForNetworkIdle { timeout_ms, .. } => {
                return timeout_ms.unwrap_or_else(config::idle_timeout_ms);
            }
            ScriptStep::Delay { .. } => None,
        };
        configured.unwrap_or_else(config::step_timeout_ms)
    }

    /// Fixed delay after the step completes.
    pub fn wait_after_ms(&self) -> u64 {
        match self {
            ScriptStep::Click { wait_after_ms, .. }
            | ScriptStep::Type { wait_after_ms, .. }
            | ScriptStep::WaitForSelector { wait_after_ms, .. }
            | ScriptStep::WaitForNavigation { wait_after_ms, .. }
            | ScriptStep::WaitForNetworkIdle { wait_after_ms, .. } => wait_after_ms.unwrap_or(0),
            ScriptStep::Delay { .. } => 0,
        }
    }

    /// Loggable description of the step. Typed values are never included.
    pub fn describe(&self) -> String {
        match self {
            ScriptStep::Click { selector, .. } => format!("click {selector}"),
            ScriptStep::Type { selector, .. } => format!("type into {selector}"),
            ScriptStep::WaitForSelector { selector, .. } => format!("wait for {selector}"),
            ScriptStep::WaitForNavigation { .. } => "wait for navigation".to_string(),
            ScriptStep::WaitForNetworkIdle { .. } => "wait for network idle".to_string(),
            ScriptStep::Delay { duration_ms } => format!("delay {duration_ms} ms"),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Declarative page setup script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSetupScript {
    pub id: String,
    pub name: String,
    pub scope: ScriptScope,
    pub trigger: Trigger,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,

    /// Selector probed before (conditional trigger) and after execution
    pub condition_selector: Option<String>,

    /// Emit a violation when the condition reappears after execution
    #[serde(default)]
    pub report_violation_if_condition_met: bool,
    pub violation_code: Option<String>,
    pub violation_message: Option<String>,

    /// Capture a test pass before / after this script runs
    #[serde(default)]
    pub test_before_execution: bool,
    #[serde(default)]
    pub test_after_execution: bool,

    /// Selectors expected to be gone once the script has run
    #[serde(default)]
    pub expect_hidden_after: Vec<String>,
}

impl PageSetupScript {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scope: ScriptScope::Website,
            trigger: Trigger::Always,
            enabled: true,
            steps: Vec::new(),
            condition_selector: None,
            report_violation_if_condition_met: false,
            violation_code: None,
            violation_message: None,
            test_before_execution: false,
            test_after_execution: false,
            expect_hidden_after: Vec::new(),
        }
    }

    pub fn scope(mut self, scope: ScriptScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn condition(mut self, selector: impl Into<String>) -> Self {
        self.condition_selector = Some(selector.into());
        self
    }

    /// Configure the persistence violation emitted when the condition is
    /// met again after execution.
    pub fn report_violation(
        mut self,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.report_violation_if_condition_met = true;
        self.violation_code = Some(code.into());
        self.violation_message = Some(message.into());
        self
    }

    pub fn multi_state(mut self, before: bool, after: bool) -> Self {
        self.test_before_execution = before;
        self.test_after_execution = after;
        self
    }

    pub fn expect_hidden_after(mut self, selectors: Vec<String>) -> Self {
        self.expect_hidden_after = selectors;
        self
    }

    /// Whether this script asks for its own before/after test states.
    pub fn wants_multi_state(&self) -> bool {
        self.test_before_execution || self.test_after_execution
    }
}

/// A `${ENV:NAME}` value referenced a variable that is not set.
#[derive(Debug, Error)]
#[error("environment variable {0} is not set")]
pub struct MissingEnvVar(pub String);

/// Resolve a step value, expanding the `${ENV:NAME}` indirection.
///
/// The resolved value is returned to the caller only; it must never reach a
/// log line or an error message.
pub fn resolve_value(value: &str) -> Result<String, MissingEnvVar> {
    if let Some(rest) = value.strip_prefix("${ENV:") {
        if let Some(name) = rest.strip_suffix('}') {
            return std::env::var(name).map_err(|_| MissingEnvVar(name.to_string()));
        }
    }
    Ok(value.to_string())
}

/// Outcome of asking the executor to run one script.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The trigger evaluator or condition probe decided against running
    Skipped { reason: SkipReason },
    /// The script ran (possibly failing partway)
    Executed {
        success: bool,
        duration_ms: u64,
        /// Persistence violation observed after execution, if any
        violation: Option<Finding>,
        /// First failing step's description, when not successful
        error: Option<String>,
    },
}

impl ExecutionOutcome {
    pub fn was_skipped(&self) -> bool {
        matches!(self, ExecutionOutcome::Skipped { .. })
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ExecutionOutcome::Executed { success: true, .. })
    }

    pub fn violation(&self) -> Option<&Finding> {
        match self {
            ExecutionOutcome::Executed { violation, .. } => violation.as_ref(),
            ExecutionOutcome::Skipped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_serde_round_trip() {
        let json = r#"{"action":"click","selector":".cookie-banner button"}"#;
        let step: ScriptStep = serde_json::from_str(json).unwrap();
        assert_eq!(step, ScriptStep::click(".cookie-banner button"));

        let delay: ScriptStep = serde_json::from_str(r#"{"action":"delay","duration_ms":250}"#).unwrap();
        assert_eq!(delay, ScriptStep::Delay { duration_ms: 250 });
    }

    #[test]
    fn test_trigger_wire_names() {
        let t: Trigger = serde_json::from_str(r#""ONCE_PER_SESSION""#).unwrap();
        assert_eq!(t, Trigger::OncePerSession);
        assert_eq!(serde_json::to_string(&ScriptScope::TestRun).unwrap(), r#""TEST_RUN""#);
    }

    #[test]
    fn test_script_deserialization_defaults() {
        let json = r#"{
            "id": "cookie",
            "name": "Dismiss Cookie Notice",
            "scope": "WEBSITE",
            "trigger": "ONCE_PER_SESSION",
            "condition_selector": ".cookie-banner",
            "violation_code": null,
            "violation_message": null
        }"#;
        let script: PageSetupScript = serde_json::from_str(json).unwrap();
        assert!(script.enabled);
        assert!(script.steps.is_empty());
        assert!(!script.report_violation_if_condition_met);
        assert!(!script.wants_multi_state());
    }

    #[test]
    fn test_resolve_value_passthrough_and_env() {
        assert_eq!(resolve_value("plain text").unwrap(), "plain text");

        unsafe { std::env::set_var("A11Y_TEST_SECRET", "s3cret") };
        assert_eq!(resolve_value("${ENV:A11Y_TEST_SECRET}").unwrap(), "s3cret");

        let err = resolve_value("${ENV:A11Y_TEST_UNSET_VAR}").unwrap_err();
        assert_eq!(err.0, "A11Y_TEST_UNSET_VAR");
    }

    #[test]
    fn test_step_describe_never_contains_value() {
        let step = ScriptStep::type_into("#password", "${ENV:PW}");
        assert_eq!(step.describe(), "type into #password");
    }

    #[test]
    fn test_step_timeout_defaults() {
        let step = ScriptStep::click("#x");
        assert_eq!(step.timeout_ms(), crate::config::get().timeouts.step_ms);

        let nav = ScriptStep::WaitForNavigation { timeout_ms: Some(5), wait_after_ms: None };
        assert_eq!(nav.timeout_ms(), 5);
    }
}
