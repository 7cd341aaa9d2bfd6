use crate::error::{GsdError, Result};
use crate::parse::{ParseOptions, DEFAULT_VELOCITY_WINDOW_DAYS};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DashboardConfig
// ---------------------------------------------------------------------------

const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Optional `.planning/dashboard.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    #[serde(default = "default_velocity_window")]
    pub velocity_window_days: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Periodic rebuild interval; `0` disables the timer.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
}

fn default_velocity_window() -> u32 {
    DEFAULT_VELOCITY_WINDOW_DAYS
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_auto_refresh() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            velocity_window_days: default_velocity_window(),
            debounce_ms: default_debounce_ms(),
            refresh_interval_secs: default_refresh_interval(),
            auto_refresh: default_auto_refresh(),
        }
    }
}

impl DashboardConfig {
    /// Load from `<root>/.planning/dashboard.yaml`; defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(data).map_err(|e| GsdError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.velocity_window_days == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "velocity_window_days is 0; using {DEFAULT_VELOCITY_WINDOW_DAYS}"
                ),
            });
        }

        if self.debounce_ms > MAX_DEBOUNCE_MS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "debounce_ms {} exceeds {MAX_DEBOUNCE_MS}; using {MAX_DEBOUNCE_MS}",
                    self.debounce_ms
                ),
            });
        }

        if !self.auto_refresh && self.refresh_interval_secs > 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "refresh_interval_secs has no effect while auto_refresh is off".to_string(),
            });
        }

        warnings
    }

    pub fn velocity_window_days(&self) -> u32 {
        if self.velocity_window_days == 0 {
            DEFAULT_VELOCITY_WINDOW_DAYS
        } else {
            self.velocity_window_days
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            velocity_window_days: self.velocity_window_days(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.min(MAX_DEBOUNCE_MS))
    }

    /// `None` when the periodic timer is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
