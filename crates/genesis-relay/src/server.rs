//! Relay server
//!
//! Accepts TCP connections and serves each with hyper directly instead of
//! `axum::serve`, so upgrade requests can be classified before the router
//! runs. A rejected upgrade fails the hyper service, which drops the
//! connection without writing a response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::context::RelayContext;
use crate::dispatch::{classify, DispatchError, UpgradeDecision};
use crate::error::RelayError;
use crate::facade::build_router;
use crate::liveness::LivenessMonitor;

/// How long shutdown waits for bridges to close their legs
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RelayServer {
    ctx: RelayContext,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RelayServer {
    /// Bind the configured host and port
    pub async fn bind(ctx: RelayContext) -> Result<Self, RelayError> {
        let server = &ctx.config().server;
        let listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            ctx,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn context(&self) -> &RelayContext {
        &self.ctx
    }

    /// Serve until `shutdown` is cancelled, then close every open session
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), RelayError> {
        let monitor = LivenessMonitor::new(self.ctx.registry().clone(), &self.ctx.config().liveness)
            .spawn(shutdown.child_token());

        let router = build_router(self.ctx.clone());
        let voice_path: Arc<str> = Arc::from(self.ctx.config().server.voice_path.as_str());

        info!(
            addr = %self.local_addr,
            voice_path = %voice_path,
            backend = %self.ctx.backend().base_url(),
            "Relay server listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            Arc::clone(&voice_path),
                        ));
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
            }
        }

        info!("Shutting down relay server");
        let closing = self.ctx.registry().close_all();
        if closing > 0 {
            info!(connections = closing, "Closing open sessions");
            self.drain().await;
        }

        if let Err(e) = monitor.await {
            warn!(error = %e, "Liveness monitor task failed");
        }
        Ok(())
    }

    async fn drain(&self) {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while !self.ctx.registry().is_empty() {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining = self.ctx.registry().count(),
                    "Sessions still open after shutdown grace period"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Router, voice_path: Arc<str>) {
    let service = service_fn(move |mut request: Request<Incoming>| {
        let router = router.clone();
        let decision = classify(&request, &voice_path);
        async move {
            if let UpgradeDecision::Reject(path) = decision {
                return Err(DispatchError::RejectedUpgrade(path));
            }
            request.extensions_mut().insert(ConnectInfo(peer));
            router.oneshot(request).await.map_err(|never| match never {})
        }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}
