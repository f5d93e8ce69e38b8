//! Bounded FIFO queues connecting stages.
//!
//! A queue carries [`Record`]s plus an explicit [`QueueItem::Sentinel`]
//! token, rather than relying on channel-close to signal end-of-stream
//! (`spec.md` §3, "Queue"; §8 testable property 1). Built on
//! `crossbeam_channel`, the same bounded-channel-per-edge model
//! `dozer-core`'s execution DAG uses for its node-to-node queues.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendError, Sender};
use tokio_util::sync::CancellationToken;

use crate::record::Record;

/// One item riding a queue: either a record, or the terminal sentinel.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Record(Record),
    Sentinel,
}

/// How long a receiver blocks on an empty queue before re-checking the
/// abort flag (`spec.md` §4.2, "bounded poll (e.g., 1 s)").
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The sending half of a queue edge.
#[derive(Clone)]
pub struct QueueSender(Sender<QueueItem>);

/// The receiving half of a queue edge.
pub struct QueueReceiver(Receiver<QueueItem>);

/// Construct a bounded queue edge with the given capacity.
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (QueueSender(tx), QueueReceiver(rx))
}

impl QueueSender {
    /// Bounded blocking put of one record. Per `spec.md` §5, this is one of
    /// the only two places a worker is allowed to block.
    pub fn send_record(&self, record: Record) -> Result<(), SendError<QueueItem>> {
        self.0.send(QueueItem::Record(record))
    }

    pub fn send_sentinel(&self) -> Result<(), SendError<QueueItem>> {
        self.0.send(QueueItem::Sentinel)
    }
}

impl QueueReceiver {
    /// Block on the next item with a bounded poll, returning `None` once the
    /// sentinel has been observed, the channel has disconnected, or `abort`
    /// has been tripped.
    pub fn recv(&self, abort: &CancellationToken) -> Option<QueueItem> {
        loop {
            if abort.is_cancelled() {
                return None;
            }
            match self.0.recv_timeout(POLL_INTERVAL) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// Adapts a [`QueueReceiver`] into a plain (fallible) [`Iterator`] of
/// records, stopping at `Sentinel`, disconnect, or abort. This is what a
/// node's inbound queue looks like to `Stage::process`.
pub struct QueueIter {
    rx: QueueReceiver,
    abort: CancellationToken,
}

impl QueueIter {
    pub fn new(rx: QueueReceiver, abort: CancellationToken) -> Self {
        QueueIter { rx, abort }
    }
}

impl Iterator for QueueIter {
    type Item = crate::record::Record;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.recv(&self.abort) {
            Some(QueueItem::Record(record)) => Some(record),
            Some(QueueItem::Sentinel) | None => None,
        }
    }
}
