//! Configuration and constants for the analyzer.
//!
//! Defaults live here as constants; an optional TOML file can override
//! the tunable ones:
//!
//! ```toml
//! flatten_threshold_ms = 25.0
//! debounce_ms = 300
//! ```

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Spans never report a duration below this (ms), so zero-width work stays visible
pub const MIN_DURATION_MS: f64 = 1.0;

/// Low-signal spans at or below this duration (ms) are elided from the table
pub const DEFAULT_FLATTEN_THRESHOLD_MS: f64 = 10.0;

/// Quiet period before a filter change is applied
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default timeout for class source requests
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Title given to the synthetic root span
pub const ROOT_TITLE: &str = "Log Root";

/// File extensions tried when loading class source from disk
pub const SOURCE_EXTENSIONS: &[&str] = &["cls", "trigger"];

/// Tunable analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Duration (ms) a low-signal span must exceed to appear in the table
    pub flatten_threshold_ms: f64,

    /// Quiet period (ms) for debounced filter recomputation
    pub debounce_ms: u64,

    /// Timeout (s) for HTTP class source requests
    pub source_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            flatten_threshold_ms: DEFAULT_FLATTEN_THRESHOLD_MS,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            source_timeout_secs: DEFAULT_SOURCE_TIMEOUT.as_secs(),
        }
    }
}

impl AnalyzerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    /// Parse configuration from TOML text, keeping defaults for missing keys
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AnalyzerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.flatten_threshold_ms.is_finite() || self.flatten_threshold_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "flatten_threshold_ms must be a non-negative number, got {}",
                self.flatten_threshold_ms
            )));
        }
        if self.source_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "source_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
///
/// # Errors
/// * `ConfigError::ReadFailed` - If file cannot be read
/// * `ConfigError::ParseFailed` - If TOML is invalid
/// * `ConfigError::Invalid` - If a value is out of range
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalyzerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    AnalyzerConfig::from_toml_str(&contents)
}
