//! Bridge states and reports

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyState::Connecting => "CONNECTING",
            ReadyState::Open => "OPEN",
            ReadyState::Closing => "CLOSING",
            ReadyState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Why a bridge finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    MissingCredential,
    DialFailed(String),
    InboundClosed,
    InboundError(String),
    UpstreamClosed,
    UpstreamError(String),
    QueueOverflow,
    Terminated,
    Shutdown,
}

impl CloseReason {
    /// Whether the client leg is already gone and must not be closed again
    pub fn inbound_gone(&self) -> bool {
        matches!(self, CloseReason::InboundClosed | CloseReason::InboundError(_))
    }

    /// Whether the upstream leg is already gone
    pub fn upstream_gone(&self) -> bool {
        matches!(self, CloseReason::UpstreamClosed | CloseReason::UpstreamError(_))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::MissingCredential => write!(f, "no upstream credential configured"),
            CloseReason::DialFailed(e) => write!(f, "upstream dial failed: {}", e),
            CloseReason::InboundClosed => write!(f, "client closed"),
            CloseReason::InboundError(e) => write!(f, "client error: {}", e),
            CloseReason::UpstreamClosed => write!(f, "upstream closed"),
            CloseReason::UpstreamError(e) => write!(f, "upstream error: {}", e),
            CloseReason::QueueOverflow => write!(f, "pending queue overflow"),
            CloseReason::Terminated => write!(f, "terminated by liveness monitor"),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Summary of a finished bridge
#[derive(Debug, Clone)]
pub struct BridgeReport {
    pub id: String,
    pub inbound: ReadyState,
    /// `None` when no dial was ever attempted
    pub upstream: Option<ReadyState>,
    pub reason: CloseReason,
    pub queued: usize,
    pub forwarded_upstream: u64,
    pub forwarded_downstream: u64,
    pub dropped_malformed: u64,
}

impl BridgeReport {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inbound: ReadyState::Open,
            upstream: None,
            reason: CloseReason::InboundClosed,
            queued: 0,
            forwarded_upstream: 0,
            forwarded_downstream: 0,
            dropped_malformed: 0,
        }
    }
}
