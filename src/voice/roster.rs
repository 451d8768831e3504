use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::types::Slot;

/// Which listener slots currently have a live connection.
pub trait ListenerRoster: Send + Sync {
    fn is_connected(&self, slot: Slot) -> bool;

    fn connected_mask(&self) -> u64 {
        Slot::all()
            .filter(|&s| self.is_connected(s))
            .fold(0, |mask, s| mask | s.bit())
    }
}

/// Roster backed by a single atomic slot mask.
#[derive(Debug, Default)]
pub struct SlotRoster {
    mask: AtomicU64,
}

impl SlotRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, slot: Slot) {
        self.mask.fetch_or(slot.bit(), Ordering::AcqRel);
    }

    pub fn disconnect(&self, slot: Slot) {
        self.mask.fetch_and(!slot.bit(), Ordering::AcqRel);
    }

    pub fn len(&self) -> usize {
        self.mask.load(Ordering::Acquire).count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListenerRoster for SlotRoster {
    fn is_connected(&self, slot: Slot) -> bool {
        self.mask.load(Ordering::Acquire) & slot.bit() != 0
    }

    fn connected_mask(&self) -> u64 {
        self.mask.load(Ordering::Acquire)
    }
}
