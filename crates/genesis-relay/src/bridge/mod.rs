//! Session bridge
//!
//! One bridge pairs one client socket with one upstream realtime connection.
//! A single task owns both legs and drives them through
//! CONNECTING -> OPEN -> CLOSED:
//!
//! - while the upstream dial is in flight, client frames are validated and
//!   queued in a [`PendingQueue`];
//! - once the dial resolves the queue is flushed in order, then frames are
//!   forwarded directly in both directions;
//! - whichever leg ends first, the other one is closed too.

mod event_log;
mod frame;
mod queue;
mod state;
mod upstream;

pub use event_log::{Direction, EventLog, LoggedEvent};
pub use frame::{Frame, FrameSink, FrameStream, Leg, RelayedEvent};
pub use queue::{PendingQueue, QueueError};
pub use state::{BridgeReport, CloseReason, ReadyState};
pub use upstream::{RealtimeDialer, UpstreamDialer};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use genesis_config::RealtimeConfig;

use crate::connection::Control;
use crate::error::{error_chain, RelayError};

/// How long a leg gets to finish its close handshake during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-bridge limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    pub max_pending_frames: usize,
    pub connect_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for BridgeSettings {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            max_pending_frames: config.max_pending_frames,
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// What to do with one item read from the client leg
enum InboundStep {
    Forward(Frame),
    Skip,
    Stop(CloseReason),
}

pub struct SessionBridge {
    id: String,
    dialer: Arc<dyn UpstreamDialer>,
    settings: BridgeSettings,
}

impl SessionBridge {
    pub fn new(id: impl Into<String>, dialer: Arc<dyn UpstreamDialer>, settings: BridgeSettings) -> Self {
        Self {
            id: id.into(),
            dialer,
            settings,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Relay between `inbound` and a freshly dialed upstream until either
    /// side ends, then tear both down.
    pub async fn run(self, mut inbound: Leg, mut control: mpsc::UnboundedReceiver<Control>) -> BridgeReport {
        let mut report = BridgeReport::new(&self.id);
        let mut events = EventLog::new();

        if !self.dialer.has_credential() {
            error!(bridge_id = %self.id, "No upstream API key configured, closing client connection");
            close_leg(&mut inbound, "client").await;
            report.inbound = ReadyState::Closed;
            report.reason = CloseReason::MissingCredential;
            return report;
        }

        let target = self.dialer.target();
        info!(bridge_id = %self.id, url = %target, "Connecting to upstream");
        report.upstream = Some(ReadyState::Connecting);

        let mut queue = PendingQueue::new(self.settings.max_pending_frames);
        let connecting = self
            .connect(&target, &mut inbound, &mut control, &mut queue, &mut report, &mut events)
            .await;

        let mut upstream = match connecting {
            Ok(upstream) => upstream,
            Err(reason) => {
                self.teardown(inbound, None, reason, &mut report, &mut events).await;
                return report;
            }
        };

        info!(bridge_id = %self.id, url = %target, queued = queue.len(), "Upstream connected");
        report.upstream = Some(ReadyState::Open);

        if let Err(reason) = self.flush(&mut queue, &mut upstream, &mut report).await {
            self.teardown(inbound, Some(upstream), reason, &mut report, &mut events)
                .await;
            return report;
        }

        let reason = self
            .relay(&mut inbound, &mut upstream, &mut control, &mut report, &mut events)
            .await;
        self.teardown(inbound, Some(upstream), reason, &mut report, &mut events)
            .await;
        report
    }

    /// CONNECTING phase: dial while queueing client frames
    async fn connect(
        &self,
        target: &str,
        inbound: &mut Leg,
        control: &mut mpsc::UnboundedReceiver<Control>,
        queue: &mut PendingQueue,
        report: &mut BridgeReport,
        events: &mut EventLog,
    ) -> Result<Leg, CloseReason> {
        let timeout = self.settings.connect_timeout;
        let dial = tokio::time::timeout(timeout, self.dialer.dial());
        tokio::pin!(dial);

        loop {
            tokio::select! {
                dialed = &mut dial => {
                    return match dialed {
                        Ok(Ok(leg)) => Ok(leg),
                        Ok(Err(e)) => {
                            error!(bridge_id = %self.id, url = %target, error = %error_chain(&e), "Upstream dial failed");
                            Err(CloseReason::DialFailed(e.to_string()))
                        }
                        Err(_) => {
                            let e = RelayError::DialTimeout { url: target.to_string(), timeout };
                            error!(bridge_id = %self.id, url = %target, "{}", e);
                            Err(CloseReason::DialFailed(e.to_string()))
                        }
                    };
                }
                item = inbound.stream.next() => {
                    match self.inspect_inbound(item, report, events) {
                        InboundStep::Forward(frame) => {
                            if let Err(e) = queue.push(frame) {
                                error!(bridge_id = %self.id, error = %e, "Dropping bridge, upstream still connecting");
                                return Err(CloseReason::QueueOverflow);
                            }
                            report.queued += 1;
                            debug!(bridge_id = %self.id, queued = queue.len(), "Queued frame until upstream is open");
                        }
                        InboundStep::Skip => {}
                        InboundStep::Stop(reason) => return Err(reason),
                    }
                }
                Some(command) = control.recv() => {
                    if let Some(reason) = self.apply_control(command, inbound).await {
                        return Err(reason);
                    }
                }
            }
        }
    }

    /// Send every queued frame upstream, exactly once
    async fn flush(
        &self,
        queue: &mut PendingQueue,
        upstream: &mut Leg,
        report: &mut BridgeReport,
    ) -> Result<(), CloseReason> {
        let frames = queue
            .take_for_flush()
            .map_err(|e| CloseReason::UpstreamError(e.to_string()))?;
        if !frames.is_empty() {
            debug!(bridge_id = %self.id, count = frames.len(), "Flushing queued frames");
        }
        for frame in frames {
            if let Err(e) = upstream.sink.send(frame).await {
                error!(bridge_id = %self.id, error = %error_chain(&e), "Failed to flush frame upstream");
                return Err(CloseReason::UpstreamError(e.to_string()));
            }
            report.forwarded_upstream += 1;
        }
        Ok(())
    }

    /// OPEN phase: forward in both directions until a leg ends
    async fn relay(
        &self,
        inbound: &mut Leg,
        upstream: &mut Leg,
        control: &mut mpsc::UnboundedReceiver<Control>,
        report: &mut BridgeReport,
        events: &mut EventLog,
    ) -> CloseReason {
        loop {
            tokio::select! {
                item = inbound.stream.next() => {
                    match self.inspect_inbound(item, report, events) {
                        InboundStep::Forward(frame) => {
                            if let Err(e) = upstream.sink.send(frame).await {
                                error!(bridge_id = %self.id, error = %error_chain(&e), "Failed to forward frame upstream");
                                return CloseReason::UpstreamError(e.to_string());
                            }
                            report.forwarded_upstream += 1;
                        }
                        InboundStep::Skip => {}
                        InboundStep::Stop(reason) => return reason,
                    }
                }
                item = upstream.stream.next() => {
                    let frame = match item {
                        None | Some(Ok(Frame::Close)) => {
                            info!(bridge_id = %self.id, "Upstream closed the connection");
                            return CloseReason::UpstreamClosed;
                        }
                        Some(Err(e)) => {
                            error!(bridge_id = %self.id, error = %error_chain(&e), "Upstream connection error");
                            return CloseReason::UpstreamError(e.to_string());
                        }
                        Some(Ok(Frame::Ping(_))) | Some(Ok(Frame::Pong(_))) => continue,
                        Some(Ok(frame)) => frame,
                    };

                    let event_type = frame
                        .payload()
                        .and_then(|payload| RelayedEvent::decode(payload).ok())
                        .map(|event| event.event_type().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    events.record(Direction::UpstreamToClient, &event_type);

                    if let Err(e) = inbound.sink.send(frame).await {
                        warn!(bridge_id = %self.id, error = %e, "Failed to forward frame to client");
                        return CloseReason::InboundError(e.to_string());
                    }
                    report.forwarded_downstream += 1;
                }
                Some(command) = control.recv() => {
                    if let Some(reason) = self.apply_control(command, inbound).await {
                        return reason;
                    }
                }
            }
        }
    }

    fn inspect_inbound(
        &self,
        item: Option<Result<Frame, RelayError>>,
        report: &mut BridgeReport,
        events: &mut EventLog,
    ) -> InboundStep {
        let frame = match item {
            None | Some(Ok(Frame::Close)) => {
                info!(bridge_id = %self.id, "Client closed the connection");
                return InboundStep::Stop(CloseReason::InboundClosed);
            }
            Some(Err(e)) => {
                warn!(bridge_id = %self.id, error = %error_chain(&e), "Client connection error");
                return InboundStep::Stop(CloseReason::InboundError(e.to_string()));
            }
            // Answered by the socket layer, never relayed
            Some(Ok(Frame::Ping(_))) | Some(Ok(Frame::Pong(_))) => return InboundStep::Skip,
            Some(Ok(frame)) => frame,
        };

        let Some(payload) = frame.payload() else {
            return InboundStep::Skip;
        };
        match RelayedEvent::decode(payload) {
            Ok(event) => {
                events.record(Direction::ClientToUpstream, event.event_type());
                InboundStep::Forward(frame)
            }
            Err(e) => {
                report.dropped_malformed += 1;
                warn!(
                    bridge_id = %self.id,
                    kind = frame.kind(),
                    len = payload.len(),
                    error = %e,
                    "Dropping malformed client frame"
                );
                InboundStep::Skip
            }
        }
    }

    /// Returns a close reason when the command ends the bridge
    async fn apply_control(&self, command: Control, inbound: &mut Leg) -> Option<CloseReason> {
        match command {
            Control::Ping => {
                if let Err(e) = inbound.sink.send(Frame::Ping(Vec::new())).await {
                    warn!(bridge_id = %self.id, error = %e, "Failed to ping client");
                    return Some(CloseReason::InboundError(e.to_string()));
                }
                None
            }
            Control::Terminate => {
                warn!(bridge_id = %self.id, "Terminating unresponsive client");
                Some(CloseReason::Terminated)
            }
            Control::Shutdown => Some(CloseReason::Shutdown),
        }
    }

    async fn teardown(
        &self,
        mut inbound: Leg,
        upstream: Option<Leg>,
        reason: CloseReason,
        report: &mut BridgeReport,
        events: &mut EventLog,
    ) {
        events.flush();
        report.inbound = ReadyState::Closing;

        if let Some(mut upstream) = upstream {
            report.upstream = Some(ReadyState::Closing);
            if !reason.upstream_gone() {
                close_leg(&mut upstream, "upstream").await;
            }
        }
        report.upstream = report.upstream.map(|_| ReadyState::Closed);

        match reason {
            // Dropping the socket aborts it without a close handshake
            CloseReason::Terminated => drop(inbound),
            ref r if r.inbound_gone() => drop(inbound),
            _ => close_leg(&mut inbound, "client").await,
        }
        report.inbound = ReadyState::Closed;

        info!(
            bridge_id = %self.id,
            reason = %reason,
            forwarded_upstream = report.forwarded_upstream,
            forwarded_downstream = report.forwarded_downstream,
            "Bridge closed"
        );
        report.reason = reason;
    }
}

async fn close_leg(leg: &mut Leg, side: &str) {
    match tokio::time::timeout(CLOSE_TIMEOUT, leg.sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(side, error = %e, "Error while closing leg"),
        Err(_) => debug!(side, "Timed out closing leg"),
    }
}
