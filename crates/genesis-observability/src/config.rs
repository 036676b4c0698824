//! Logging configuration
//!
//! Read from the relay config file or built directly for tests.

#[cfg(feature = "genesis-config")]
pub mod genesis_integration;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logging output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default = "default_false")]
    pub json_format: bool,

    /// Per-module level overrides
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Enable ANSI colors
    #[serde(default = "default_true")]
    pub ansi_colors: bool,

    /// Include the event target
    #[serde(default = "default_true")]
    pub include_target: bool,

    /// Include the thread id
    #[serde(default = "default_false")]
    pub include_thread_id: bool,

    /// Include source line numbers
    #[serde(default = "default_true")]
    pub include_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            module_levels: HashMap::new(),
            ansi_colors: true,
            include_target: true,
            include_thread_id: false,
            include_line_number: true,
        }
    }
}

impl LoggingConfig {
    /// Set the base log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Toggle JSON output
    pub fn with_json_format(mut self, json: bool) -> Self {
        self.json_format = json;
        // ANSI escapes inside JSON strings are noise
        if json {
            self.ansi_colors = false;
        }
        self
    }

    /// Add a module-specific level
    pub fn with_module_level(mut self, module: impl Into<String>, level: impl Into<String>) -> Self {
        self.module_levels.insert(module.into(), level.into());
        self
    }
}

fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::default()
            .with_log_level("debug")
            .with_json_format(true);

        assert_eq!(config.level, "debug");
        assert!(config.json_format);
        assert!(!config.ansi_colors);
    }

    #[test]
    fn test_module_levels() {
        let config = LoggingConfig::default()
            .with_module_level("genesis_relay", "debug")
            .with_module_level("hyper", "warn");

        assert_eq!(
            config.module_levels.get("genesis_relay"),
            Some(&"debug".to_string())
        );
        assert_eq!(config.module_levels.get("hyper"), Some(&"warn".to_string()));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "warn"}"#).unwrap();
        assert_eq!(config.level, "warn");
        assert!(config.include_target);
        assert!(!config.json_format);
    }
}
