//! REST façade
//!
//! Forwards a fixed set of calls to the Genesis backend and serves the voice
//! socket route. Upgrade requests for any other path never reach this router;
//! the server aborts them first.

mod backend;
mod error;
pub mod handlers;

pub use backend::BackendClient;
pub use error::{BackendError, BackendFailure, ErrorEnvelope};

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument};

use genesis_observability::create_request_span;

use crate::context::RelayContext;
use crate::dispatch::voice_handler;

/// Build the façade router for `ctx`
pub fn build_router(ctx: RelayContext) -> Router {
    let server = &ctx.config().server;

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/realtime/tools", get(handlers::tools))
        .route("/realtime/genesis_tool", post(handlers::genesis_tool))
        .route("/realtime/get_endpoint", get(handlers::get_endpoint))
        .route(&server.voice_path, get(voice_handler))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http());

    if server.cors {
        router = router.layer(CorsLayer::very_permissive());
    }

    router.with_state(ctx.clone())
}

async fn log_request(request: Request, next: Next) -> Response {
    let span = create_request_span(request.method().as_str(), request.uri().path());
    async move {
        info!("Incoming request");
        let response = next.run(request).await;
        info!(status = response.status().as_u16(), "Request completed");
        response
    }
    .instrument(span)
    .await
}
