//! Upstream realtime API client

use async_trait::async_trait;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tracing::debug;

use genesis_config::RealtimeConfig;

use super::frame::Leg;
use crate::error::RelayError;

/// Opens the upstream leg of a bridge
#[async_trait]
pub trait UpstreamDialer: Send + Sync {
    /// Whether a credential is configured at all
    fn has_credential(&self) -> bool;

    /// Target URL, for logs and error messages
    fn target(&self) -> String;

    async fn dial(&self) -> Result<Leg, RelayError>;
}

/// Dials the realtime speech API over WebSocket
#[derive(Clone)]
pub struct RealtimeDialer {
    endpoint: String,
    api_key: Option<String>,
}

impl RealtimeDialer {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        }
    }
}

impl std::fmt::Debug for RealtimeDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeDialer")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl UpstreamDialer for RealtimeDialer {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn target(&self) -> String {
        self.endpoint.clone()
    }

    async fn dial(&self) -> Result<Leg, RelayError> {
        let api_key = self.api_key.as_deref().ok_or(RelayError::MissingCredential)?;

        let mut request = self.endpoint.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| RelayError::InvalidRequest(format!("Invalid API key header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        request.headers_mut().insert(
            HeaderName::from_static("openai-beta"),
            HeaderValue::from_static("realtime=v1"),
        );

        let (socket, response) = connect_async(request).await?;
        debug!(url = %self.endpoint, status = %response.status(), "Upstream handshake complete");

        Ok(Leg::from_tungstenite(socket))
    }
}
