//! Façade error envelope

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::error_chain;

/// Why a backend call failed
#[derive(Debug, thiserror::Error)]
pub enum BackendFailure {
    #[error("Backend responded with {}", .0.as_u16())]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// A failed backend call, rendered as `500 {error, url, stack}`
#[derive(Debug, thiserror::Error)]
#[error("Backend request to {url} failed: {failure}")]
pub struct BackendError {
    pub url: String,
    #[source]
    pub failure: BackendFailure,
}

impl BackendError {
    pub fn new(url: impl Into<String>, failure: BackendFailure) -> Self {
        Self {
            url: url.into(),
            failure,
        }
    }

    /// The failure and its causes on one line
    pub fn message(&self) -> String {
        error_chain(&self.failure).replace("\ncaused by: ", ": ")
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.message(),
            url: self.url.clone(),
            stack: Some(error_chain(&self.failure)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let envelope = self.envelope();
        error!(url = %envelope.url, error = %envelope.error, "Responding with backend error");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response()
    }
}

/// A request body the façade could not decode, rendered as `{error, url}`
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct InvalidBody {
    pub status: StatusCode,
    pub url: String,
    pub message: String,
}

impl InvalidBody {
    pub fn new(url: impl Into<String>, rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            url: url.into(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for InvalidBody {
    fn into_response(self) -> Response {
        warn!(url = %self.url, status = self.status.as_u16(), error = %self.message, "Rejected request body");
        let envelope = ErrorEnvelope {
            error: self.message,
            url: self.url,
            stack: None,
        };
        (self.status, Json(envelope)).into_response()
    }
}
