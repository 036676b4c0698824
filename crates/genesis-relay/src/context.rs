//! Process context
//!
//! Everything shared between sessions lives here and is built once at
//! startup: configuration, the backend HTTP client with its keep-alive pool,
//! the upstream dialer and the connection registry.

use std::sync::Arc;

use genesis_config::Config;

use crate::bridge::{BridgeSettings, RealtimeDialer, UpstreamDialer};
use crate::connection::ConnectionRegistry;
use crate::error::RelayError;
use crate::facade::BackendClient;

#[derive(Clone)]
pub struct RelayContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: Config,
    backend: BackendClient,
    dialer: Arc<dyn UpstreamDialer>,
    registry: ConnectionRegistry,
}

impl RelayContext {
    /// Build the context with the realtime API dialer
    pub fn new(config: Config) -> Result<Self, RelayError> {
        let dialer = Arc::new(RealtimeDialer::new(&config.realtime));
        Self::with_dialer(config, dialer)
    }

    /// Build the context with a custom upstream dialer
    pub fn with_dialer(config: Config, dialer: Arc<dyn UpstreamDialer>) -> Result<Self, RelayError> {
        let backend = BackendClient::new(&config.backend)?;
        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                backend,
                dialer,
                registry: ConnectionRegistry::new(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    pub fn dialer(&self) -> Arc<dyn UpstreamDialer> {
        Arc::clone(&self.inner.dialer)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings::from(&self.inner.config.realtime)
    }
}

impl std::fmt::Debug for RelayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayContext")
            .field("backend", &self.inner.backend)
            .field("upstream", &self.inner.dialer.target())
            .field("connections", &self.inner.registry.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_default_config() {
        let mut config = Config::default();
        config.realtime.max_pending_frames = 16;
        let ctx = RelayContext::new(config).unwrap();

        assert_eq!(ctx.bridge_settings().max_pending_frames, 16);
        assert!(!ctx.dialer().has_credential());
        assert_eq!(ctx.backend().base_url(), "http://127.0.0.1:8080");
        assert!(ctx.registry().is_empty());

        // Clones share the registry
        let clone = ctx.clone();
        let (handle, _rx) = crate::connection::ConnectionHandle::new("c1", None);
        clone.registry().add(handle);
        assert_eq!(ctx.registry().count(), 1);
    }
}
