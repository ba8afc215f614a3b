//! Progress reporting from the worker to the caller.
//!
//! The engines call a [`ProgressSink`] once per entry. [`ThrottledSender`]
//! coalesces those calls into at most one message per interval and pushes
//! them through a bounded channel, so a large tree never floods the consumer.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::time::{Duration, Instant};

/// Default minimum spacing between forwarded updates.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(75);

/// Which engine produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Moving,
    Restoring,
}

/// A single progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: Phase,
    /// 1-based index of the entry being processed.
    pub current: usize,
    /// Total entries, when known up front.
    pub total: Option<usize>,
    /// File name of the entry being processed.
    pub name: String,
}

impl ProgressUpdate {
    /// True for the last entry of a known-size batch.
    pub fn is_last(&self) -> bool {
        self.total.is_some_and(|total| self.current >= total)
    }
}

/// Receives progress from the scan, execute and restore loops.
pub trait ProgressSink {
    fn report(&mut self, update: ProgressUpdate);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _update: ProgressUpdate) {}
}

/// Keeps every update in memory.
impl ProgressSink for Vec<ProgressUpdate> {
    fn report(&mut self, update: ProgressUpdate) {
        self.push(update);
    }
}

/// Forwards updates through a bounded channel, at most one per interval.
///
/// The first update and the last update of a known-size batch are always
/// forwarded. Intermediate updates are dropped when the interval has not
/// elapsed or the channel is full; the worker never blocks on a slow consumer.
pub struct ThrottledSender<T> {
    sender: SyncSender<T>,
    wrap: fn(ProgressUpdate) -> T,
    interval: Duration,
    last_sent: Option<Instant>,
}

impl<T> ThrottledSender<T> {
    /// `wrap` turns an update into the channel's message type.
    pub fn new(sender: SyncSender<T>, wrap: fn(ProgressUpdate) -> T) -> Self {
        Self {
            sender,
            wrap,
            interval: DEFAULT_PROGRESS_INTERVAL,
            last_sent: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn due(&self, now: Instant) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }
}

impl<T> ProgressSink for ThrottledSender<T> {
    fn report(&mut self, update: ProgressUpdate) {
        let now = Instant::now();
        let last = update.is_last();
        if !last && !self.due(now) {
            return;
        }

        let message = (self.wrap)(update);
        let sent = if last {
            // The closing update is worth waiting for
            self.sender.send(message).is_ok()
        } else {
            match self.sender.try_send(message) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
            }
        };
        if sent {
            self.last_sent = Some(now);
        }
    }
}
