pub mod config;
pub mod loader;

pub use config::{
    BackendConfig, Config, ConfigError, ConfigResult, LivenessConfig, LoggingConfig,
    RealtimeConfig, ServerConfig,
};
pub use loader::ConfigLoader;

use std::path::PathBuf;

/// Expand a leading `~/` to the user's home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}
