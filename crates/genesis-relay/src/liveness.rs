//! Liveness monitor
//!
//! Every ping interval each registered connection is checked: a connection
//! that never answered the previous ping is terminated, every other one has
//! its flag cleared and gets a fresh ping. A second, shorter timer logs how
//! many connections are open.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use genesis_config::LivenessConfig;

use crate::connection::{ConnectionRegistry, Control};

/// Result of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub pinged: usize,
    pub terminated: usize,
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    registry: ConnectionRegistry,
    ping_interval: Duration,
    report_interval: Duration,
}

impl LivenessMonitor {
    pub fn new(registry: ConnectionRegistry, config: &LivenessConfig) -> Self {
        Self {
            registry,
            ping_interval: config.ping_interval(),
            report_interval: config.report_interval(),
        }
    }

    pub fn sweep(&self) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for handle in self.registry.handles() {
            if !handle.is_alive() {
                warn!(connection_id = %handle.id, "No pong since last ping, terminating connection");
                // A closed channel means the bridge is already gone
                let _ = handle.send(Control::Terminate);
                self.registry.remove(&handle.id);
                outcome.terminated += 1;
                continue;
            }

            handle.set_alive(false);
            if handle.send(Control::Ping).is_err() {
                debug!(connection_id = %handle.id, "Bridge gone, dropping stale registry entry");
                self.registry.remove(&handle.id);
            } else {
                outcome.pinged += 1;
            }
        }

        outcome
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let start = Instant::now();
        let mut ping = interval_at(start + self.ping_interval, self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = interval_at(start + self.report_interval, self.report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            ping_interval_secs = self.ping_interval.as_secs(),
            "Liveness monitor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Liveness monitor stopped");
                    break;
                }
                _ = ping.tick() => {
                    let outcome = self.sweep();
                    if outcome.terminated > 0 {
                        info!(pinged = outcome.pinged, terminated = outcome.terminated, "Liveness sweep");
                    } else {
                        debug!(pinged = outcome.pinged, "Liveness sweep");
                    }
                }
                _ = report.tick() => {
                    let count = self.registry.count();
                    if count > 0 {
                        info!(connections = count, "Active client connections");
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;

    fn monitor(registry: &ConnectionRegistry, ping_secs: u64) -> LivenessMonitor {
        LivenessMonitor::new(
            registry.clone(),
            &LivenessConfig {
                ping_interval_secs: ping_secs,
                report_interval_secs: 5,
            },
        )
    }

    #[tokio::test]
    async fn test_sweep_pings_then_terminates_silent_connection() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = ConnectionHandle::new("c1", None);
        registry.add(handle.clone());
        let monitor = monitor(&registry, 30);

        let first = monitor.sweep();
        assert_eq!(first, SweepOutcome { pinged: 1, terminated: 0 });
        assert!(!handle.is_alive());
        assert_eq!(rx.recv().await, Some(Control::Ping));

        let second = monitor.sweep();
        assert_eq!(second, SweepOutcome { pinged: 0, terminated: 1 });
        assert_eq!(rx.recv().await, Some(Control::Terminate));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_pong_keeps_connection() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = ConnectionHandle::new("c1", None);
        let flag = handle.liveness_flag();
        registry.add(handle);
        let monitor = monitor(&registry, 30);

        for _ in 0..3 {
            assert_eq!(monitor.sweep().pinged, 1);
            assert_eq!(rx.recv().await, Some(Control::Ping));
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_sweep_drops_entries_without_bridge() {
        let registry = ConnectionRegistry::new();
        let (handle, rx) = ConnectionHandle::new("c1", None);
        drop(rx);
        registry.add(handle);

        let outcome = monitor(&registry, 30).sweep();
        assert_eq!(outcome, SweepOutcome::default());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_on_interval_until_cancelled() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = ConnectionHandle::new("c1", None);
        registry.add(handle);

        let shutdown = CancellationToken::new();
        let task = monitor(&registry, 2).spawn(shutdown.clone());

        assert_eq!(rx.recv().await, Some(Control::Ping));
        assert_eq!(rx.recv().await, Some(Control::Terminate));
        assert!(registry.is_empty());

        shutdown.cancel();
        task.await.unwrap();
    }
}
