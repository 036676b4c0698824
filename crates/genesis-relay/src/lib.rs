//! Genesis realtime relay
//!
//! Bridges browser voice sessions to the realtime speech API and forwards a
//! small set of REST calls to the Genesis backend.
//!
//! - [`facade`]: REST endpoints and the voice route
//! - [`dispatch`]: accepts or aborts upgrade requests
//! - [`bridge`]: per-session relay between the browser and the upstream API
//! - [`liveness`]: ping sweep that reaps dead client sockets
//! - [`server`]: TCP accept loop and graceful shutdown

pub mod bridge;
pub mod cli;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod liveness;
pub mod server;

pub use bridge::{BridgeReport, BridgeSettings, CloseReason, Frame, Leg, SessionBridge, UpstreamDialer};
pub use connection::{ConnectionHandle, ConnectionRegistry, Control};
pub use context::RelayContext;
pub use error::RelayError;
pub use liveness::LivenessMonitor;
pub use server::RelayServer;
