use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads relay configuration from disk
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load defaults, or the given file when present
    pub async fn load_optional(path: Option<&Path>) -> ConfigResult<Config> {
        match path {
            Some(path) => Self::new(path).load().await,
            None => {
                debug!("No config file given, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Read, expand `${VAR}` references and parse the file.
    ///
    /// The format is chosen from the extension: `.toml` is TOML, anything
    /// else is JSON. Validation is left to the caller so that CLI overrides
    /// can be applied first.
    pub async fn load(&self) -> ConfigResult<Config> {
        if !self.path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                self.path
            )));
        }

        info!("Loading config from {:?}", self.path);
        let content = tokio::fs::read_to_string(&self.path).await?;
        let content = Self::expand_env_vars(&content)?;

        let config = match self.path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Expand `${VAR}` or `${VAR:-default}`
    pub(crate) fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(format!("Bad expansion pattern: {}", e)))?;
        let mut result = String::with_capacity(content.len());
        let mut last = 0;

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };

            let (var_name, default_value) = match var_expr.as_str().split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr.as_str(), None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result.push_str(&content[last..full_match.start()]);
            result.push_str(&replacement);
            last = full_match.end();
        }

        result.push_str(&content[last..]);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_without_file_gives_defaults() {
        let config = ConfigLoader::load_optional(None).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(temp_dir.path().join("absent.json"));
        assert!(matches!(loader.load().await, Err(ConfigError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_load_json_with_env_expansion() {
        std::env::set_var("GENESIS_TEST_BACKEND", "http://backend.internal:8080");
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay.json");
        tokio::fs::write(
            &path,
            r#"{
                "backend": {
                    "url": "${GENESIS_TEST_BACKEND}",
                    "tools_bot_id": "${GENESIS_TEST_BOT:-Janice}",
                    "default_endpoint_name": "udfendpoint",
                    "timeout_secs": 5
                }
            }"#,
        )
        .await
        .unwrap();

        let config = ConfigLoader::new(&path).load().await.unwrap();
        assert_eq!(config.backend.url, "http://backend.internal:8080");
        assert_eq!(config.backend.tools_bot_id, "Janice");
        assert_eq!(config.backend.timeout_secs, 5);
        assert_eq!(config.server, crate::ServerConfig::default());
    }

    #[tokio::test]
    async fn test_load_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay.toml");
        tokio::fs::write(
            &path,
            r#"
            [liveness]
            ping_interval_secs = 10
            report_interval_secs = 2
            "#,
        )
        .await
        .unwrap();

        let config = ConfigLoader::new(&path).load().await.unwrap();
        assert_eq!(config.liveness.ping_interval_secs, 10);
        assert_eq!(config.liveness.report_interval_secs, 2);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("GENESIS_TEST_VAR", "test_value");
        let expanded =
            ConfigLoader::expand_env_vars(r#"{"a": "${GENESIS_TEST_VAR}", "b": "x"}"#).unwrap();
        assert_eq!(expanded, r#"{"a": "test_value", "b": "x"}"#);
    }

    #[test]
    fn test_missing_env_var() {
        let err = ConfigLoader::expand_env_vars("${GENESIS_TEST_DEFINITELY_UNSET}").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "GENESIS_TEST_DEFINITELY_UNSET"));
    }
}
