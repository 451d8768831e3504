use std::time::Instant;

use bytes::Bytes;

use crate::common::types::{AnyResult, Slot};

/// One cycle's worth of Opus packets for a single listener.
#[derive(Debug, Clone)]
pub struct VoicePacket {
    pub slot: Slot,
    /// Shared by every unit of the same cycle; grows by one per cycle.
    pub section: u64,
    /// Concatenated Opus packets.
    pub payload: Bytes,
    /// End offset of each packet inside `payload`.
    pub offsets: Vec<u32>,
    pub captured_at: Instant,
}

impl VoicePacket {
    /// Splits the payload back into individual Opus packets.
    pub fn packets(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut start = 0usize;
        self.offsets.iter().map(move |&end| {
            let end = (end as usize).min(self.payload.len());
            let packet = &self.payload[start.min(end)..end];
            start = end;
            packet
        })
    }
}

/// Host-side sender. Only ever invoked from the drain step.
pub trait VoiceTransport {
    fn send(&mut self, packet: &VoicePacket) -> AnyResult<()>;
}

impl<F> VoiceTransport for F
where
    F: FnMut(&VoicePacket) -> AnyResult<()>,
{
    fn send(&mut self, packet: &VoicePacket) -> AnyResult<()> {
        self(packet)
    }
}
