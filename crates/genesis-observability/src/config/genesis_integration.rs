//! Conversion from the relay's `genesis-config` logging section.

use crate::config::LoggingConfig;

impl From<&genesis_config::LoggingConfig> for LoggingConfig {
    fn from(config: &genesis_config::LoggingConfig) -> Self {
        let mut logging = LoggingConfig::default()
            .with_log_level(config.level.clone())
            .with_json_format(config.json_format);
        for (module, level) in &config.module_levels {
            logging = logging.with_module_level(module.clone(), level.clone());
        }
        logging
    }
}
