use std::sync::atomic::{AtomicU64, Ordering};

use flume::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::warn;

use super::transport::VoicePacket;

/// Bounded MPSC queue between the producer and the host's drain step.
///
/// Pushing never blocks: when the queue is full the oldest unit is dropped
/// and counted. Once closed, pushes are discarded.
pub struct HandoffQueue {
    tx: RwLock<Option<Sender<VoicePacket>>>,
    rx: Receiver<VoicePacket>,
    dropped: AtomicU64,
}

impl HandoffQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity.max(1));
        Self {
            tx: RwLock::new(Some(tx)),
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, mut packet: VoicePacket) {
        let tx = self.tx.read();
        let Some(tx) = tx.as_ref() else {
            return;
        };
        loop {
            match tx.try_send(packet) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(oldest) = self.rx.try_recv() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            slot = %oldest.slot,
                            section = oldest.section,
                            "Handoff queue full, dropping oldest unit"
                        );
                    }
                    packet = rejected;
                }
                // the receiver lives in self
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn try_pop(&self) -> Option<VoicePacket> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discards every queued unit, returning how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.drain().count()
    }

    /// Stops accepting units and discards the queued ones.
    ///
    /// Waits for any push in progress, so nothing lands after this returns.
    pub fn close(&self) -> usize {
        self.tx.write().take();
        self.clear()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use bytes::Bytes;

    use super::*;
    use crate::common::types::Slot;

    fn unit(section: u64) -> VoicePacket {
        VoicePacket {
            slot: Slot::new(0).unwrap(),
            section,
            payload: Bytes::new(),
            offsets: Vec::new(),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn full_queue_drops_the_oldest() {
        let queue = HandoffQueue::new(2);
        for section in 0..5 {
            queue.push(unit(section));
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 3);
        assert_eq!(queue.try_pop().map(|p| p.section), Some(3));
        assert_eq!(queue.try_pop().map(|p| p.section), Some(4));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn clear_discards_everything() {
        let queue = HandoffQueue::new(8);
        queue.push(unit(0));
        queue.push(unit(1));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn closed_queue_discards_pushes() {
        let queue = HandoffQueue::new(8);
        queue.push(unit(0));
        assert_eq!(queue.close(), 1);

        queue.push(unit(1));
        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 0);
    }
}
