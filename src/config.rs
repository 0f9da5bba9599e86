//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for the harness, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults that match the original hardcoded values
//! - Builder pattern for programmatic configuration
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `A11Y_HARNESS_STEP_TIMEOUT` | Default script step timeout (ms) | `10000` |
//! | `A11Y_HARNESS_NAV_TIMEOUT` | Navigation timeout (ms) | `30000` |
//! | `A11Y_HARNESS_IDLE_TIMEOUT` | Network-idle wait timeout (ms) | `15000` |
//! | `A11Y_HARNESS_LOGIN_TIMEOUT` | Login attempt timeout (ms) | `45000` |
//! | `A11Y_HARNESS_RESTART_SETTLE` | Delay after a browser restart (ms) | `1000` |
//! | `A11Y_HARNESS_RESTART_ATTEMPTS` | Restart attempts before giving up | `2` |
//! | `A11Y_HARNESS_DEFAULT_VIEWPORT` | Default viewport preset | `desktop` |
//!
//! # Example
//!
//! ```bash
//! # Slow staging environment: give navigations more room
//! export A11Y_HARNESS_NAV_TIMEOUT="60000"
//! export A11Y_HARNESS_DEFAULT_VIEWPORT="mobile"
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values (matching original hardcoded values)
// ============================================================================

/// Default per-step timeout (milliseconds)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Default navigation timeout (milliseconds)
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

/// Default network-idle wait timeout (milliseconds)
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 15_000;

/// Default login attempt timeout (milliseconds)
pub const DEFAULT_LOGIN_TIMEOUT_MS: u64 = 45_000;

/// Default settle delay after a forced browser restart (milliseconds)
pub const DEFAULT_RESTART_SETTLE_MS: u64 = 1_000;

/// Default number of browser restart attempts before a run is abandoned
pub const DEFAULT_RESTART_ATTEMPTS: u32 = 2;

/// Default viewport preset
pub const DEFAULT_VIEWPORT: &str = "desktop";

/// Default viewport width (pixels)
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1366;

/// Default viewport height (pixels)
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 768;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the per-step timeout
pub const ENV_STEP_TIMEOUT: &str = "A11Y_HARNESS_STEP_TIMEOUT";

/// Environment variable for the navigation timeout
pub const ENV_NAV_TIMEOUT: &str = "A11Y_HARNESS_NAV_TIMEOUT";

/// Environment variable for the network-idle timeout
pub const ENV_IDLE_TIMEOUT: &str = "A11Y_HARNESS_IDLE_TIMEOUT";

/// Environment variable for the login timeout
pub const ENV_LOGIN_TIMEOUT: &str = "A11Y_HARNESS_LOGIN_TIMEOUT";

/// Environment variable for the restart settle delay
pub const ENV_RESTART_SETTLE: &str = "A11Y_HARNESS_RESTART_SETTLE";

/// Environment variable for the restart attempt count
pub const ENV_RESTART_ATTEMPTS: &str = "A11Y_HARNESS_RESTART_ATTEMPTS";

/// Environment variable for the default viewport preset
pub const ENV_DEFAULT_VIEWPORT: &str = "A11Y_HARNESS_DEFAULT_VIEWPORT";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for the harness
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout configuration
    pub timeouts: TimeoutSettings,
    /// Browser lifecycle configuration
    pub browser: BrowserSettings,
}

/// Timeout-related settings
#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    /// Default per-step timeout (milliseconds)
    pub step_ms: u64,
    /// Navigation timeout (milliseconds)
    pub nav_ms: u64,
    /// Network-idle wait timeout (milliseconds)
    pub idle_ms: u64,
    /// Login attempt timeout (milliseconds)
    pub login_ms: u64,
}

/// Browser lifecycle settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Settle delay after a forced restart (milliseconds)
    pub restart_settle_ms: u64,
    /// Restart attempts before a run is abandoned
    pub restart_attempts: u32,
    /// Default viewport preset
    pub viewport: String,
    /// Default viewport width
    pub viewport_width: u32,
    /// Default viewport height
    pub viewport_height: u32,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            timeouts: TimeoutSettings::from_env(),
            browser: BrowserSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            timeouts: TimeoutSettings::defaults(),
            browser: BrowserSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TimeoutSettings {
    /// Create timeout settings from environment variables
    pub fn from_env() -> Self {
        Self {
            step_ms: env_u64(ENV_STEP_TIMEOUT, DEFAULT_STEP_TIMEOUT_MS),
            nav_ms: env_u64(ENV_NAV_TIMEOUT, DEFAULT_NAV_TIMEOUT_MS),
            idle_ms: env_u64(ENV_IDLE_TIMEOUT, DEFAULT_IDLE_TIMEOUT_MS),
            login_ms: env_u64(ENV_LOGIN_TIMEOUT, DEFAULT_LOGIN_TIMEOUT_MS),
        }
    }

    /// Create timeout settings with defaults
    pub fn defaults() -> Self {
        Self {
            step_ms: DEFAULT_STEP_TIMEOUT_MS,
            nav_ms: DEFAULT_NAV_TIMEOUT_MS,
            idle_ms: DEFAULT_IDLE_TIMEOUT_MS,
            login_ms: DEFAULT_LOGIN_TIMEOUT_MS,
        }
    }
}

impl BrowserSettings {
    /// Create browser settings from environment variables
    pub fn from_env() -> Self {
        let viewport = env::var(ENV_DEFAULT_VIEWPORT)
            .unwrap_or_else(|_| DEFAULT_VIEWPORT.to_string());

        // Parse viewport preset to get dimensions
        let (width, height) = parse_viewport(&viewport)
            .unwrap_or((DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT));

        Self {
            restart_settle_ms: env_u64(ENV_RESTART_SETTLE, DEFAULT_RESTART_SETTLE_MS),
            restart_attempts: env::var(ENV_RESTART_ATTEMPTS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RESTART_ATTEMPTS),
            viewport,
            viewport_width: width,
            viewport_height: height,
        }
    }

    /// Create browser settings with defaults
    pub fn defaults() -> Self {
        Self {
            restart_settle_ms: DEFAULT_RESTART_SETTLE_MS,
            restart_attempts: DEFAULT_RESTART_ATTEMPTS,
            viewport: DEFAULT_VIEWPORT.to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse a viewport string into (width, height)
/// Supports: "mobile" (375x812), "tablet" (768x1024), "desktop" (1366x768), "wide" (1920x1080), or "WxH"
pub fn parse_viewport(viewport: &str) -> Option<(u32, u32)> {
    match viewport.to_lowercase().as_str() {
        "mobile" => Some((375, 812)),
        "tablet" => Some((768, 1024)),
        "desktop" => Some((1366, 768)),
        "wide" => Some((1920, 1080)),
        custom => {
            let parts: Vec<&str> = custom.split('x').collect();
            if parts.len() == 2 {
                let w = parts[0].parse().ok()?;
                let h = parts[1].parse().ok()?;
                Some((w, h))
            } else {
                None
            }
        }
    }
}

/// Get the default step timeout (convenience function)
pub fn step_timeout_ms() -> u64 {
    get().timeouts.step_ms
}

/// Get the navigation timeout (convenience function)
pub fn nav_timeout_ms() -> u64 {
    get().timeouts.nav_ms
}

/// Get the network-idle timeout (convenience function)
pub fn idle_timeout_ms() -> u64 {
    get().timeouts.idle_ms
}

/// Get the login timeout (convenience function)
pub fn login_timeout_ms() -> u64 {
    get().timeouts.login_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport_presets() {
        assert_eq!(parse_viewport("mobile"), Some((375, 812)));
        assert_eq!(parse_viewport("tablet"), Some((768, 1024)));
        assert_eq!(parse_viewport("desktop"), Some((1366, 768)));
        assert_eq!(parse_viewport("wide"), Some((1920, 1080)));
    }

    #[test]
    fn test_parse_viewport_custom() {
        assert_eq!(parse_viewport("1024x768"), Some((1024, 768)));
        assert_eq!(parse_viewport("414x896"), Some((414, 896)));
    }

    #[test]
    fn test_parse_viewport_invalid() {
        assert_eq!(parse_viewport("invalid"), None);
        assert_eq!(parse_viewport("1024"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.timeouts.step_ms, DEFAULT_STEP_TIMEOUT_MS);
        assert_eq!(config.timeouts.nav_ms, DEFAULT_NAV_TIMEOUT_MS);
        assert_eq!(config.browser.viewport, DEFAULT_VIEWPORT);
    }
}
