//! Pre-OPEN frame queue

use std::collections::VecDeque;

use super::frame::Frame;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Pending queue is full ({capacity} frames)")]
    Full { capacity: usize },
    #[error("Pending queue was already flushed")]
    Flushed,
}

/// Bounded FIFO holding client frames while the upstream dial is in flight.
///
/// The queue is drained exactly once. After [`PendingQueue::take_for_flush`]
/// every further push or flush is refused, so frames can never be queued
/// behind direct-forwarded ones.
#[derive(Debug)]
pub struct PendingQueue {
    frames: VecDeque<Frame>,
    capacity: usize,
    flushed: bool,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
            flushed: false,
        }
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), QueueError> {
        if self.flushed {
            return Err(QueueError::Flushed);
        }
        if self.frames.len() >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Hand over every queued frame in arrival order
    pub fn take_for_flush(&mut self) -> Result<VecDeque<Frame>, QueueError> {
        if self.flushed {
            return Err(QueueError::Flushed);
        }
        self.flushed = true;
        Ok(std::mem::take(&mut self.frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
