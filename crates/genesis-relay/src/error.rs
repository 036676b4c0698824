//! Relay error types

use std::error::Error as StdError;
use std::time::Duration;

/// Errors raised by the relay's transport and session layers
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Client socket error: {0}")]
    ClientSocket(#[from] axum::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Queue(#[from] crate::bridge::QueueError),
    #[error("No upstream API key configured")]
    MissingCredential,
    #[error("Upstream dial to {url} timed out after {timeout:?}")]
    DialTimeout { url: String, timeout: Duration },
    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),
    #[error("Channel closed")]
    ChannelClosed,
}

/// Render an error and its sources, one per line
pub fn error_chain(err: &dyn StdError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\ncaused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_error_chain_walks_sources() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&err), "outer\ncaused by: connection refused");
    }

    #[test]
    fn test_dial_timeout_message() {
        let err = RelayError::DialTimeout {
            url: "wss://example.test/v1/realtime".to_string(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(
            err.to_string(),
            "Upstream dial to wss://example.test/v1/realtime timed out after 3s"
        );
    }
}
