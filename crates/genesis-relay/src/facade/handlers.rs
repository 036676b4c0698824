//! Façade request handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{BackendError, InvalidBody};
use crate::context::RelayContext;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub backend_url: String,
}

/// Always healthy; never touches the backend
pub async fn health(State(ctx): State<RelayContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        backend_url: ctx.backend().base_url().to_string(),
    })
}

pub async fn tools(State(ctx): State<RelayContext>) -> Result<Json<Value>, BackendError> {
    ctx.backend().get_tools().await.map(Json)
}

/// Forward the caller's JSON body.
///
/// A body sent without a JSON content type is forwarded as `{}`; a JSON body
/// that fails to parse is answered with a 400 envelope.
pub async fn genesis_tool(
    State(ctx): State<RelayContext>,
    uri: Uri,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => json!({}),
        Err(rejection) => return InvalidBody::new(uri.path(), rejection).into_response(),
    };

    match ctx.backend().genesis_tool(&body).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct EndpointQuery {
    pub endpoint_name: Option<String>,
}

pub async fn get_endpoint(
    State(ctx): State<RelayContext>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<Value>, BackendError> {
    ctx.backend()
        .get_endpoint(query.endpoint_name.as_deref())
        .await
        .map(Json)
}

/// Endpoints listed in the 404 envelope
pub fn available_endpoints(voice_path: &str) -> Vec<String> {
    vec![
        "GET /health".to_string(),
        "GET /realtime/tools".to_string(),
        "POST /realtime/genesis_tool".to_string(),
        "GET /realtime/get_endpoint".to_string(),
        format!("WS {}", voice_path),
    ]
}

pub async fn not_found(State(ctx): State<RelayContext>, method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Cannot {} {}", method, uri.path()),
            "available_endpoints": available_endpoints(&ctx.config().server.voice_path),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use genesis_config::Config;

    #[tokio::test]
    async fn test_health_timestamp_has_millis() {
        let ctx = RelayContext::new(Config::default()).unwrap();
        let Json(body) = health(State(ctx)).await;

        assert_eq!(body.status, "healthy");
        assert_eq!(body.backend_url, "http://127.0.0.1:8080");
        assert!(body.timestamp.ends_with('Z'));
        // 2024-10-01T12:00:00.000Z
        assert_eq!(body.timestamp.len(), 24);
        assert!(DateTime::parse_from_rfc3339(&body.timestamp).is_ok());
    }

    #[test]
    fn test_available_endpoints_include_voice_path() {
        let endpoints = available_endpoints("/voice");
        assert_eq!(endpoints.len(), 5);
        assert_eq!(endpoints.last().map(String::as_str), Some("WS /voice"));
    }
}
