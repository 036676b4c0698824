//! Relayed event log
//!
//! Every relayed event is logged with its `type` and direction. Runs of the
//! same type in the same direction collapse into one entry with a count,
//! which keeps audio delta streams from flooding the log.

use std::fmt;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::ClientToUpstream => 0,
            Direction::UpstreamToClient => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToUpstream => write!(f, "client->upstream"),
            Direction::UpstreamToClient => write!(f, "upstream->client"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub direction: Direction,
    pub event_type: String,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct EventLog {
    pending: [Option<LoggedEvent>; 2],
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event.
    ///
    /// Returns the entry that was emitted because the run for `direction`
    /// ended, if any.
    pub fn record(&mut self, direction: Direction, event_type: &str) -> Option<LoggedEvent> {
        let slot = &mut self.pending[direction.index()];
        if let Some(current) = slot {
            if current.event_type == event_type {
                current.count += 1;
                return None;
            }
        }

        let finished = slot.replace(LoggedEvent {
            direction,
            event_type: event_type.to_string(),
            count: 1,
        });
        if let Some(entry) = &finished {
            emit(entry);
        }
        finished
    }

    /// Emit whatever runs are still open
    pub fn flush(&mut self) -> Vec<LoggedEvent> {
        let mut flushed = Vec::new();
        for slot in self.pending.iter_mut() {
            if let Some(entry) = slot.take() {
                emit(&entry);
                flushed.push(entry);
            }
        }
        flushed
    }
}

fn emit(entry: &LoggedEvent) {
    if entry.count > 1 {
        debug!(
            direction = %entry.direction,
            event_type = %entry.event_type,
            count = entry.count,
            "Relayed event (repeated)"
        );
    } else {
        debug!(
            direction = %entry.direction,
            event_type = %entry.event_type,
            "Relayed event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_types_coalesce() {
        let mut log = EventLog::new();
        assert_eq!(log.record(Direction::UpstreamToClient, "response.audio.delta"), None);
        assert_eq!(log.record(Direction::UpstreamToClient, "response.audio.delta"), None);
        assert_eq!(log.record(Direction::UpstreamToClient, "response.audio.delta"), None);

        let emitted = log.record(Direction::UpstreamToClient, "response.done");
        assert_eq!(
            emitted,
            Some(LoggedEvent {
                direction: Direction::UpstreamToClient,
                event_type: "response.audio.delta".to_string(),
                count: 3,
            })
        );
    }

    #[test]
    fn test_directions_are_tracked_separately() {
        let mut log = EventLog::new();
        log.record(Direction::ClientToUpstream, "input_audio_buffer.append");
        // An upstream event does not break the client run
        log.record(Direction::UpstreamToClient, "response.audio.delta");
        assert_eq!(log.record(Direction::ClientToUpstream, "input_audio_buffer.append"), None);

        let flushed = log.flush();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].direction, Direction::ClientToUpstream);
        assert_eq!(flushed[0].count, 2);
        assert_eq!(flushed[1].count, 1);
        assert!(log.flush().is_empty());
    }
}
