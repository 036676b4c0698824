//! Upgrade dispatch
//!
//! Decides which HTTP upgrade requests become voice sessions. Only the voice
//! path is accepted; any other upgrade is aborted before the router sees it,
//! so the peer gets no HTTP response at all.

use std::net::SocketAddr;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Request};
use axum::response::Response;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use genesis_observability::create_bridge_span;

use crate::bridge::{Leg, SessionBridge};
use crate::connection::ConnectionHandle;
use crate::context::RelayContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Plain HTTP, serve through the façade
    NotUpgrade,
    Accept,
    /// Abort the connection; carries the offending path
    Reject(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Upgrade rejected for path {0}")]
    RejectedUpgrade(String),
}

pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    request.headers().contains_key(header::UPGRADE)
}

pub fn classify<B>(request: &Request<B>, voice_path: &str) -> UpgradeDecision {
    if !is_upgrade_request(request) {
        return UpgradeDecision::NotUpgrade;
    }

    let path = request.uri().path();
    if path == voice_path {
        UpgradeDecision::Accept
    } else {
        warn!(path = %path, "Rejecting upgrade for unknown path");
        UpgradeDecision::Reject(path.to_string())
    }
}

/// Route handler for the voice path
pub async fn voice_handler(
    State(ctx): State<RelayContext>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ws: WebSocketUpgrade,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| accept(ctx, socket, peer))
}

/// Register the new connection and run its bridge to completion
async fn accept(ctx: RelayContext, socket: WebSocket, peer: Option<SocketAddr>) {
    let id = Uuid::new_v4().to_string();
    let (handle, control) = ConnectionHandle::new(id.clone(), peer);
    let alive = handle.liveness_flag();
    ctx.registry().add(handle);

    let peer_label = peer.map(|addr| addr.to_string());
    info!(connection_id = %id, peer = ?peer_label, "Client connected");

    let inbound = Leg::from_axum(socket).on_pong(alive);
    let bridge = SessionBridge::new(id.clone(), ctx.dialer(), ctx.bridge_settings());
    let span = create_bridge_span(&id, peer_label.as_deref());
    let report = bridge.run(inbound, control).instrument(span).await;

    ctx.registry().remove(&id);
    info!(
        connection_id = %id,
        reason = %report.reason,
        queued = report.queued,
        dropped_malformed = report.dropped_malformed,
        "Client disconnected"
    );
}
