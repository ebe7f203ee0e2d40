//! Caro Engine - Statistics publication
//!
//! Each worker owns a bounded `crossbeam_channel` sender; on overflow the
//! oldest queued sample is dropped rather than blocking the search thread,
//! since a few stale stats samples are harmless but a stalled searcher is
//! not.

use crate::search::NodeCounters;
use crossbeam_channel::{Receiver, Sender, TrySendError};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct StatsSample {
    pub worker_id: usize,
    pub depth: i32,
    pub stats: NodeCounters,
    pub elapsed_ms: u64,
}

pub struct StatsPublisher {
    sender: Sender<StatsSample>,
    /// A second handle onto the same queue, used only to evict the oldest
    /// sample on overflow; the real consumer holds its own clone.
    evictor: Receiver<StatsSample>,
}

impl StatsPublisher {
    /// Publishes a sample, dropping the oldest queued one on overflow
    /// instead of blocking.
    pub fn publish(&self, sample: StatsSample) {
        match self.sender.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(sample)) => {
                // Channel saturated: make room by discarding the oldest
                // sample, then retry once. A second failure (another
                // producer raced us) is fine to drop silently.
                let _ = self.evictor.try_recv();
                let _ = self.sender.try_send(sample);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(target: "caro_engine::stats", "stats receiver disconnected");
            }
        }
    }
}

/// Creates a bounded stats channel; returns the publisher half (one per
/// worker thread) and the consumer half (held by the engine or a host-layer
/// UI).
pub fn channel() -> (StatsPublisher, Receiver<StatsSample>) {
    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
    (StatsPublisher { sender: tx, evictor: rx.clone() }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(worker_id: usize, depth: i32) -> StatsSample {
        StatsSample { worker_id, depth, stats: NodeCounters::default(), elapsed_ms: 0 }
    }

    #[test]
    fn publish_then_receive_round_trips() {
        let (publisher, receiver) = channel();
        publisher.publish(sample(0, 3));
        let got = receiver.try_recv().unwrap();
        assert_eq!(got.depth, 3);
    }

    #[test]
    fn overflow_does_not_block_the_producer() {
        let (publisher, _receiver) = channel();
        for d in 0..(CHANNEL_CAPACITY as i32 * 2) {
            publisher.publish(sample(0, d));
        }
        // No assertion beyond "this returns" -- the whole point is that a
        // saturated channel never blocks the search thread.
    }
}
