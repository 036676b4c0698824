//! Client connection registry
//!
//! Tracks every accepted voice socket so the liveness monitor can reach it.
//! The registry never owns a socket: it holds a cloneable handle with the
//! connection's liveness flag and the sender half of its control channel,
//! and the bridge task that owns the socket acts on the commands.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Commands delivered to a connection's bridge task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Send a ping frame to the client
    Ping,
    /// Drop the client socket without a close handshake
    Terminate,
    /// Close both legs, the server is going away
    Shutdown,
}

/// Handle to a live client connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection ID
    pub id: String,
    /// Client address, when the transport exposes one
    pub addr: Option<SocketAddr>,
    /// Accept time
    pub connected_at: DateTime<Utc>,
    /// Cleared by each liveness sweep, set again by the client's pong
    alive: Arc<AtomicBool>,
    sender: mpsc::UnboundedSender<Control>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its bridge listens on
    pub fn new(id: impl Into<String>, addr: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<Control>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            id: id.into(),
            addr,
            connected_at: Utc::now(),
            alive: Arc::new(AtomicBool::new(true)),
            sender,
        };
        (handle, receiver)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Shared flag for the pong handler
    pub fn liveness_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    /// Send a command to this connection
    pub fn send(&self, command: Control) -> Result<(), ConnectionError> {
        self.sender.send(command).map_err(|_| ConnectionError::Closed)
    }

    /// Get connection ID
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Every open client connection, keyed by ID
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: ConnectionHandle) {
        debug!(connection_id = %handle.id, "Connection registered");
        self.connections.insert(handle.id.clone(), handle);
    }

    pub fn remove(&self, connection_id: &str) -> Option<ConnectionHandle> {
        let removed = self.connections.remove(connection_id).map(|(_, handle)| handle);
        if removed.is_some() {
            debug!(connection_id = %connection_id, "Connection removed from registry");
        }
        removed
    }

    pub fn get(&self, connection_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(connection_id).map(|entry| entry.value().clone())
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Snapshot of all handles
    ///
    /// Taken up front so no shard lock is held while commands are sent.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Ask every connection to shut down; returns how many were reached
    pub fn close_all(&self) -> usize {
        let mut reached = 0;
        for handle in self.handles() {
            if handle.send(Control::Shutdown).is_ok() {
                reached += 1;
            }
        }
        reached
    }
}

/// Connection-related errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_starts_alive() {
        let (handle, _rx) = ConnectionHandle::new("c1", None);
        assert!(handle.is_alive());

        let flag = handle.liveness_flag();
        handle.set_alive(false);
        assert!(!flag.load(Ordering::SeqCst));
        flag.store(true, Ordering::SeqCst);
        assert!(handle.is_alive());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (handle, rx) = ConnectionHandle::new("c1", None);
        drop(rx);
        assert_eq!(handle.send(Control::Ping), Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = ConnectionRegistry::new();
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let (first, mut first_rx) = ConnectionHandle::new("c1", Some(addr));
        let (second, second_rx) = ConnectionHandle::new("c2", None);
        registry.add(first);
        registry.add(second);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get("c1").unwrap().addr, Some(addr));

        drop(second_rx);
        assert_eq!(registry.close_all(), 1);
        assert_eq!(first_rx.recv().await, Some(Control::Shutdown));

        assert!(registry.remove("c1").is_some());
        assert!(registry.remove("c1").is_none());
        assert_eq!(registry.count(), 1);
    }
}
