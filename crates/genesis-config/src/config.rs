use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Paths served by the REST façade
const RESERVED_PATHS: &[&str] = &[
    "/health",
    "/realtime/tools",
    "/realtime/genesis_tool",
    "/realtime/get_endpoint",
];

/// Top-level relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            realtime: RealtimeConfig::default(),
            liveness: LivenessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Set a value by dotted key, e.g. `realtime.max_pending_frames`
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["server", "host"] => {
                self.server.host = value.to_string();
            }
            ["server", "port"] => {
                self.server.port = parse_value(key, value)?;
            }
            ["server", "voice_path"] => {
                self.server.voice_path = value.to_string();
            }
            ["server", "cors"] => {
                self.server.cors = parse_value(key, value)?;
            }
            ["backend", "url"] => {
                self.backend.url = value.trim_end_matches('/').to_string();
            }
            ["backend", "tools_bot_id"] => {
                self.backend.tools_bot_id = value.to_string();
            }
            ["backend", "default_endpoint_name"] => {
                self.backend.default_endpoint_name = value.to_string();
            }
            ["backend", "timeout_secs"] => {
                self.backend.timeout_secs = parse_value(key, value)?;
            }
            ["backend", "accept_invalid_certs"] => {
                self.backend.accept_invalid_certs = parse_value(key, value)?;
            }
            ["realtime", "url"] => {
                self.realtime.url = value.to_string();
            }
            ["realtime", "model"] => {
                self.realtime.model = value.to_string();
            }
            ["realtime", "api_key"] => {
                self.realtime.api_key = Some(value.to_string()).filter(|k| !k.trim().is_empty());
            }
            ["realtime", "connect_timeout_secs"] => {
                self.realtime.connect_timeout_secs = parse_value(key, value)?;
            }
            ["realtime", "max_pending_frames"] => {
                self.realtime.max_pending_frames = parse_value(key, value)?;
            }
            ["liveness", "ping_interval_secs"] => {
                self.liveness.ping_interval_secs = parse_value(key, value)?;
            }
            ["liveness", "report_interval_secs"] => {
                self.liveness.report_interval_secs = parse_value(key, value)?;
            }
            ["logging", "level"] => {
                self.logging.level = value.to_string();
            }
            ["logging", "json_format"] => {
                self.logging.json_format = parse_value(key, value)?;
            }
            ["logging", "module_levels", module] => {
                self.logging
                    .module_levels
                    .insert((*module).to_string(), value.to_string());
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        let voice_path = self.server.voice_path.as_str();
        if !voice_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "Voice path must start with '/': {}",
                voice_path
            )));
        }

        if voice_path.contains([':', '*']) {
            return Err(ConfigError::Validation(format!(
                "Voice path cannot contain route captures: {}",
                voice_path
            )));
        }

        if RESERVED_PATHS.contains(&voice_path.trim_end_matches('/')) {
            return Err(ConfigError::Validation(format!(
                "Voice path collides with a REST route: {}",
                voice_path
            )));
        }

        if !(self.backend.url.starts_with("http://") || self.backend.url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Backend URL must be http(s): {}",
                self.backend.url
            )));
        }

        if !(self.realtime.url.starts_with("ws://") || self.realtime.url.starts_with("wss://")) {
            return Err(ConfigError::Validation(format!(
                "Realtime URL must be ws(s): {}",
                self.realtime.url
            )));
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "backend.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.realtime.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "realtime.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.realtime.max_pending_frames == 0 {
            return Err(ConfigError::Validation(
                "realtime.max_pending_frames must be greater than 0".to_string(),
            ));
        }

        if self.liveness.ping_interval_secs == 0 || self.liveness.report_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Liveness intervals must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid value for {}: {}", key, value)))
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The only path accepted for WebSocket upgrades
    pub voice_path: String,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            voice_path: "/voice".to_string(),
            cors: true,
        }
    }
}

/// Genesis backend origin used by the REST façade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Identifying parameter sent with `get_tools`
    pub tools_bot_id: String,
    pub default_endpoint_name: String,
    pub timeout_secs: u64,
    /// Skip TLS verification for an https backend
    pub accept_invalid_certs: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            tools_bot_id: "Janice".to_string(),
            default_endpoint_name: "udfendpoint".to_string(),
            timeout_secs: 30,
            accept_invalid_certs: false,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Upstream realtime speech API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RealtimeConfig {
    pub url: String,
    pub model: String,
    /// An empty key counts as unset
    #[serde(
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<String>,
    pub connect_timeout_secs: u64,
    /// Frames buffered while the upstream dial is pending
    pub max_pending_frames: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".to_string(),
            model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
            api_key: None,
            connect_timeout_secs: 30,
            max_pending_frames: 1024,
        }
    }
}

impl RealtimeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Full dial URL including the model query
    pub fn endpoint(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, sep, self.model)
    }
}

/// Ping sweep and connection-count reporting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LivenessConfig {
    pub ping_interval_secs: u64,
    pub report_interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            report_interval_secs: 5,
        }
    }
}

impl LivenessConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `info,genesis_relay=debug`
    pub level: String,
    pub json_format: bool,
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            module_levels: HashMap::new(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.voice_path, "/voice");
        assert_eq!(config.backend.url, "http://127.0.0.1:8080");
        assert_eq!(config.liveness.ping_interval_secs, 30);
        assert!(config.realtime.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();
        config.set_value("server.port", "9000").unwrap();
        config.set_value("backend.url", "http://backend:8080/").unwrap();
        config.set_value("realtime.max_pending_frames", "16").unwrap();
        config
            .set_value("logging.module_levels.genesis_relay", "debug")
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.backend.url, "http://backend:8080");
        assert_eq!(config.realtime.max_pending_frames, 16);
        assert_eq!(
            config.logging.module_levels.get("genesis_relay").map(String::as_str),
            Some("debug")
        );
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(
            config.set_value("server.port", "not-a-port"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("server.nope", "1"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_empty_api_key_is_unset() {
        let mut config = Config::default();
        config.set_value("realtime.api_key", "").unwrap();
        assert!(config.realtime.api_key.is_none());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backend.url = "ftp://backend".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.realtime.url = "https://api.openai.com/v1/realtime".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.voice_path = "voice".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.realtime.max_pending_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_voice_path_cannot_shadow_routes() {
        for path in ["/health", "/realtime/tools/", "/:session", "/voice/*rest"] {
            let mut config = Config::default();
            config.server.voice_path = path.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "{} should be rejected",
                path
            );
        }

        let mut config = Config::default();
        config.server.voice_path = "/realtime/voice".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"server": {"voice_path": "/realtime-voice"}, "realtime": {"max_pending_frames": 64}}"#,
        )
        .unwrap();
        assert_eq!(config.server.voice_path, "/realtime-voice");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.realtime.max_pending_frames, 64);
        assert_eq!(config.realtime.url, RealtimeConfig::default().url);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_in_file_is_unset() {
        let config: Config =
            serde_json::from_str(r#"{"realtime": {"api_key": ""}}"#).unwrap();
        assert!(config.realtime.api_key.is_none());

        let config: Config =
            serde_json::from_str(r#"{"realtime": {"api_key": "sk-test"}}"#).unwrap();
        assert_eq!(config.realtime.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_realtime_endpoint() {
        let config = RealtimeConfig::default();
        assert_eq!(
            config.endpoint(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01"
        );

        let config = RealtimeConfig {
            url: "ws://localhost:9000/rt?x=1".to_string(),
            model: "m".to_string(),
            ..RealtimeConfig::default()
        };
        assert_eq!(config.endpoint(), "ws://localhost:9000/rt?x=1&model=m");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9100
            voice_path = "/voice"
            cors = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.backend, BackendConfig::default());
    }
}
