//! Genesis backend client
//!
//! One `reqwest::Client` per process; its connection pool is shared by every
//! façade request.

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use genesis_config::BackendConfig;

use super::error::{BackendError, BackendFailure};
use crate::error::RelayError;

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    tools_bot_id: String,
    default_endpoint_name: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            tools_bot_id: config.tools_bot_id.clone(),
            default_endpoint_name: config.default_endpoint_name.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /realtime/get_tools?bot_id=<tools bot>`
    pub async fn get_tools(&self) -> Result<Value, BackendError> {
        let endpoint = self.endpoint("/realtime/get_tools");
        let url = format!("{}?bot_id={}", endpoint, self.tools_bot_id);
        let request = self
            .http
            .get(&endpoint)
            .query(&[("bot_id", self.tools_bot_id.as_str())]);
        self.execute(request, url).await
    }

    /// `POST /realtime/genesis_tool` with the caller's body
    pub async fn genesis_tool(&self, body: &Value) -> Result<Value, BackendError> {
        let url = self.endpoint("/realtime/genesis_tool");
        let request = self.http.post(&url).json(body);
        self.execute(request, url).await
    }

    /// `GET /realtime/get_endpoint?endpoint_name=<name>`
    ///
    /// An absent or empty name falls back to the configured default.
    pub async fn get_endpoint(&self, endpoint_name: Option<&str>) -> Result<Value, BackendError> {
        let name = endpoint_name
            .filter(|name| !name.is_empty())
            .unwrap_or(self.default_endpoint_name.as_str());
        let url = self.endpoint("/realtime/get_endpoint");
        let request = self.http.get(&url).query(&[("endpoint_name", name)]);
        self.execute(request, url).await
    }

    async fn execute(&self, request: RequestBuilder, url: String) -> Result<Value, BackendError> {
        debug!(url = %url, "Forwarding to backend");

        let outcome = Self::send(request).await;

        match outcome {
            Ok(body) => {
                debug!(url = %url, "Backend call succeeded");
                Ok(body)
            }
            Err(failure) => {
                warn!(url = %url, error = %failure, "Backend call failed");
                Err(BackendError::new(url, failure))
            }
        }
    }

    async fn send(request: RequestBuilder) -> Result<Value, BackendFailure> {
        let response = request
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendFailure::Status(status));
        }
        Ok(response.json::<Value>().await?)
    }
}
