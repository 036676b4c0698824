//! Structured logging
//!
//! Installs a `tracing` subscriber with an `EnvFilter` and a plain or JSON
//! `fmt` layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ObservabilityError, Result};

/// Owns the logging setup for the process
#[derive(Debug)]
pub struct LogManager {
    config: LoggingConfig,
}

impl LogManager {
    /// Build the filter and install the global subscriber
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let manager = Self {
            config: config.clone(),
        };

        let filter = manager.build_filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let installed = if manager.config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(manager.config.include_target)
                .with_thread_ids(manager.config.include_thread_id)
                .with_line_number(manager.config.include_line_number)
                .with_ansi(false);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(manager.config.include_target)
                .with_thread_ids(manager.config.include_thread_id)
                .with_line_number(manager.config.include_line_number)
                .with_ansi(manager.config.ansi_colors);
            registry.with(layer).try_init()
        };
        installed.map_err(|e| ObservabilityError::init(e.to_string()))?;

        tracing::info!(
            target: "genesis_observability",
            "Log manager initialized with level: {}",
            manager.config.level
        );

        Ok(manager)
    }

    /// Combine the base level with per-module directives
    pub fn build_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

        for (module, level) in &self.config.module_levels {
            filter = filter.add_directive(
                format!("{}={}", module, level)
                    .parse()
                    .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
            );
        }

        Ok(filter)
    }
}

/// Span for one façade request
pub fn create_request_span(method: &str, path: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %method,
        path = %path,
    )
}

/// Span for one session bridge
pub fn create_bridge_span(bridge_id: &str, peer: Option<&str>) -> tracing::Span {
    if let Some(peer) = peer {
        tracing::info_span!(
            "bridge",
            bridge_id = %bridge_id,
            peer = %peer,
        )
    } else {
        tracing::info_span!(
            "bridge",
            bridge_id = %bridge_id,
        )
    }
}
