//! Harness configuration.
//!
//! Values come from three layers, lowest to highest precedence: built-in defaults, an
//! optional YAML file, and `FACETCHECK_*` environment variables. The CLI applies its own
//! flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HarnessError, HarnessResult};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub waits: WaitConfig,
}

/// Static content server settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind and to use in page URLs
    pub host: String,
    /// Fixed listening port
    pub port: u16,
    /// Directory served as the site root
    pub root: PathBuf,
    /// Upper bound on the wait for the listener to answer its first request
    pub settle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            root: PathBuf::from("."),
            settle_timeout_ms: 2000,
        }
    }
}

impl ServerConfig {
    /// Base URL pages are served from, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Browser engine to launch
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Some(Self::Chromium),
            "firefox" => Some(Self::Firefox),
            "webkit" => Some(Self::Webkit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }
}

/// Options applied to every browser session
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub browser: BrowserKind,
    pub headless: bool,
    pub disable_automation_signals: bool,
    pub allow_cross_origin: bool,
    pub allow_local_file_access: bool,
    /// Every element lookup retries up to this bound before failing
    pub implicit_wait_ms: u64,
    pub maximized: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chromium,
            headless: true,
            disable_automation_signals: true,
            allow_cross_origin: true,
            allow_local_file_access: true,
            implicit_wait_ms: 10_000,
            maximized: true,
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

impl SessionConfig {
    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }
}

/// Budgets for the poll-based waits
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaitConfig {
    pub poll_interval_ms: u64,
    /// Fixed pause used when a settle poll never sees a stable snapshot
    pub settle_fallback_ms: u64,
    /// Minimum quiet time between two agreeing settle reads
    pub settle_quiet_ms: u64,
    /// How long settle polling may run before falling back to the fixed pause
    pub settle_budget_ms: u64,
    pub nearby_appear_timeout_ms: u64,
    pub nearby_disappear_timeout_ms: u64,
    pub nearby_fallback_ms: u64,
    /// Pause after a location override so the page can pick it up
    pub location_pause_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            settle_fallback_ms: 1000,
            settle_quiet_ms: 250,
            settle_budget_ms: 3000,
            nearby_appear_timeout_ms: 3000,
            nearby_disappear_timeout_ms: 20_000,
            nearby_fallback_ms: 3000,
            location_pause_ms: 2000,
        }
    }
}

impl WaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HarnessConfig {
    /// Load a YAML config file; missing keys keep their defaults
    pub fn from_yaml_file(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_yaml_str(text: &str) -> HarnessResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| HarnessError::Config(e.to_string()))
    }

    /// Layer environment overrides using `lookup` (usually `std::env::var(..).ok()`)
    pub fn apply_env<F>(&mut self, lookup: F) -> HarnessResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("FACETCHECK_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                HarnessError::Config(format!("FACETCHECK_PORT={port} is not a port"))
            })?;
        }
        if let Some(root) = lookup("FACETCHECK_ROOT") {
            self.server.root = PathBuf::from(root);
        }
        if let Some(host) = lookup("FACETCHECK_HOST") {
            self.server.host = host;
        }
        if let Some(headless) = lookup("FACETCHECK_HEADLESS") {
            self.session.headless = !matches!(
                headless.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(browser) = lookup("BROWSER") {
            self.session.browser = BrowserKind::parse(&browser)
                .ok_or_else(|| HarnessError::Config(format!("unknown BROWSER '{browser}'")))?;
        }
        Ok(())
    }

    /// Defaults plus process environment
    pub fn from_env() -> HarnessResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_the_serving_contract() {
        let config = HarnessConfig::default();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.server.base_url(), "http://127.0.0.1:8888");
        assert!(config.session.headless);
        assert_eq!(config.session.implicit_wait(), Duration::from_secs(10));
        assert_eq!(config.waits.nearby_disappear_timeout_ms, 20_000);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = HarnessConfig::from_yaml_str(
            "server:\n  port: 9000\n  root: site\nsession:\n  browser: firefox\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.root, PathBuf::from("site"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.session.browser, BrowserKind::Firefox);
        assert_eq!(config.session.implicit_wait_ms, 10_000);
        assert_eq!(config.waits, WaitConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(
            HarnessConfig::from_yaml_str("  \n").unwrap(),
            HarnessConfig::default()
        );
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = HarnessConfig::from_yaml_str("server: [1, 2").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("FACETCHECK_PORT", "9123"),
            ("FACETCHECK_ROOT", "/srv/site"),
            ("FACETCHECK_HEADLESS", "false"),
            ("BROWSER", "WebKit"),
        ]
        .into_iter()
        .collect();

        let mut config = HarnessConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9123);
        assert_eq!(config.server.root, PathBuf::from("/srv/site"));
        assert!(!config.session.headless);
        assert_eq!(config.session.browser, BrowserKind::Webkit);
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_env(|key| (key == "FACETCHECK_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("FACETCHECK_PORT"));

        let err = config
            .apply_env(|key| (key == "BROWSER").then(|| "netscape".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("netscape"));
    }
}
