//! Command line interface
//!
//! Every flag can also come from the environment. Flags and environment
//! variables override the config file, which overrides built-in defaults.

use clap::Parser;

use genesis_config::{expand_tilde, Config, ConfigError, ConfigLoader};

#[derive(Debug, Parser)]
#[command(name = "genesis-relay")]
#[command(about = "Realtime voice relay and REST façade for the Genesis backend")]
#[command(version)]
pub struct Cli {
    /// Config file path (JSON, or TOML with a .toml extension)
    #[arg(long, env = "GENESIS_RELAY_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Path accepting voice WebSocket upgrades
    #[arg(long, env = "VOICE_PATH")]
    pub voice_path: Option<String>,

    /// Genesis backend origin
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    #[arg(long, env = "BACKEND_TIMEOUT_SECS")]
    pub backend_timeout_secs: Option<u64>,

    /// Skip TLS certificate verification for the backend
    #[arg(long, env = "BACKEND_INSECURE", num_args = 0..=1, default_missing_value = "true")]
    pub backend_insecure: Option<bool>,

    #[arg(long, env = "TOOLS_BOT_ID")]
    pub tools_bot_id: Option<String>,

    /// Realtime API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "REALTIME_URL")]
    pub realtime_url: Option<String>,

    #[arg(long, env = "REALTIME_MODEL")]
    pub realtime_model: Option<String>,

    #[arg(long, env = "PING_INTERVAL_SECS")]
    pub ping_interval_secs: Option<u64>,

    /// Log filter, e.g. `info` or `info,genesis_relay=debug`
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,

    #[arg(long, env = "LOG_JSON", num_args = 0..=1, default_missing_value = "true")]
    pub log_json: Option<bool>,

    /// Override any config key, e.g. `--set realtime.max_pending_frames=256`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

impl Cli {
    /// Dotted-key overrides in the order they are applied
    pub fn overrides(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let mut overrides = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                overrides.push((key.to_string(), value));
            }
        };

        push("server.host", self.host.clone());
        push("server.port", self.port.map(|p| p.to_string()));
        push("server.voice_path", self.voice_path.clone());
        push("backend.url", self.backend_url.clone());
        push("backend.timeout_secs", self.backend_timeout_secs.map(|t| t.to_string()));
        push("backend.accept_invalid_certs", self.backend_insecure.map(|b| b.to_string()));
        push("backend.tools_bot_id", self.tools_bot_id.clone());
        push("realtime.api_key", self.api_key.clone());
        push("realtime.url", self.realtime_url.clone());
        push("realtime.model", self.realtime_model.clone());
        push("liveness.ping_interval_secs", self.ping_interval_secs.map(|s| s.to_string()));
        push("logging.level", self.log_level.clone());
        push("logging.json_format", self.log_json.map(|b| b.to_string()));

        for entry in &self.set {
            let (key, value) = entry.split_once('=').ok_or_else(|| {
                ConfigError::Validation(format!("Expected KEY=VALUE, got '{}'", entry))
            })?;
            overrides.push((key.trim().to_string(), value.to_string()));
        }

        Ok(overrides)
    }

    /// Load the config file if any, apply overrides, then validate
    pub async fn load_config(&self) -> Result<Config, ConfigError> {
        let path = match self.config.as_deref() {
            Some(raw) => Some(expand_tilde(raw).ok_or_else(|| {
                ConfigError::InvalidPath(format!("Cannot resolve home directory in {}", raw))
            })?),
            None => None,
        };

        let mut config = ConfigLoader::load_optional(path.as_deref()).await?;
        for (key, value) in self.overrides()? {
            config.set_value(&key, &value)?;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "genesis-relay",
            "--port",
            "9000",
            "--backend-insecure",
            "--log-json",
            "false",
            "--set",
            "realtime.max_pending_frames=8",
        ])
        .unwrap();

        let overrides = cli.overrides().unwrap();
        assert!(overrides.contains(&("server.port".to_string(), "9000".to_string())));
        assert!(overrides.contains(&("backend.accept_invalid_certs".to_string(), "true".to_string())));
        assert!(overrides.contains(&("logging.json_format".to_string(), "false".to_string())));
        assert_eq!(
            overrides.last(),
            Some(&("realtime.max_pending_frames".to_string(), "8".to_string()))
        );
    }

    #[test]
    fn test_malformed_set_is_rejected() {
        let cli = Cli::try_parse_from(["genesis-relay", "--set", "server.port"]).unwrap();
        assert!(matches!(cli.overrides(), Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_flags_override_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"server": {{"voice_path": "/realtime-voice"}}, "backend": {{"url": "http://file.test:8080"}}}}"#
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "genesis-relay",
            "--config",
            file.path().to_str().unwrap(),
            "--backend-url",
            "http://flag.test:9090/",
        ])
        .unwrap();

        let config = cli.load_config().await.unwrap();
        assert_eq!(config.server.voice_path, "/realtime-voice");
        assert_eq!(config.backend.url, "http://flag.test:9090");
    }

    #[tokio::test]
    async fn test_invalid_override_fails_validation() {
        let cli = Cli::try_parse_from(["genesis-relay", "--realtime-url", "https://not-a-socket"]).unwrap();
        assert!(matches!(cli.load_config().await, Err(ConfigError::Validation(_))));
    }
}
