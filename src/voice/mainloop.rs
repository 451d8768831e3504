use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, span, warn};

use super::{
    handoff::HandoffQueue,
    roster::ListenerRoster,
    transport::{VoicePacket, VoiceTransport},
};
use crate::{
    audio::{
        AudioManager,
        constants::{
            MAINLOOP_BUFFER_SIZE, MAX_LISTENERS, OPUS_BUFFER_SIZE, PACKET_INTERVAL_MS,
            SUB_TICKS_PER_CYCLE,
        },
    },
    common::{
        errors::{AudioError, Result},
        types::Slot,
    },
    configs::MainloopConfig,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MainloopState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl MainloopState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Produces one unit per listener per cycle and publishes it to the queue.
///
/// Owns the per-listener accumulation buffers. Everything it touches on the
/// manager happens from the thread running the cycle.
pub struct Producer {
    manager: Arc<AudioManager>,
    roster: Arc<dyn ListenerRoster>,
    queue: Arc<HandoffQueue>,
    enabled: Arc<AtomicBool>,
    section: Arc<AtomicU64>,
    buffers: Vec<Box<[u8]>>,
    lens: [usize; MAX_LISTENERS],
    offsets: Vec<Vec<u32>>,
}

impl Producer {
    fn new(
        manager: Arc<AudioManager>,
        roster: Arc<dyn ListenerRoster>,
        queue: Arc<HandoffQueue>,
        enabled: Arc<AtomicBool>,
        section: Arc<AtomicU64>,
    ) -> Self {
        Self {
            manager,
            roster,
            queue,
            enabled,
            section,
            buffers: (0..MAX_LISTENERS)
                .map(|_| vec![0u8; MAINLOOP_BUFFER_SIZE].into_boxed_slice())
                .collect(),
            lens: [0; MAX_LISTENERS],
            offsets: (0..MAX_LISTENERS)
                .map(|_| Vec::with_capacity(SUB_TICKS_PER_CYCLE))
                .collect(),
        }
    }

    /// Runs one 30 ms cycle: three sub-ticks of mixing and encoding, then
    /// publishes a unit for every listener that produced packets.
    ///
    /// Returns the number of units published.
    pub fn run_cycle(&mut self) -> usize {
        if !self.enabled.load(Ordering::Acquire) || self.manager.is_disposed() {
            return 0;
        }

        let section = self.section.fetch_add(1, Ordering::AcqRel) + 1;
        let _span = span!(Level::DEBUG, "voice_cycle", section).entered();
        let captured_at = Instant::now();
        // roster changes apply from the next cycle
        let connected = self.roster.connected_mask();
        let mut failed = 0u64;

        for _ in 0..SUB_TICKS_PER_CYCLE {
            for slot in Slot::all() {
                if failed & slot.bit() != 0 || connected & slot.bit() == 0 {
                    continue;
                }
                match self.manager.has_frame(slot) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!(%slot, "Skipping listener: {e}");
                        failed |= slot.bit();
                        continue;
                    }
                }

                let i = slot.index();
                let start = self.lens[i];
                let end = (start + OPUS_BUFFER_SIZE).min(MAINLOOP_BUFFER_SIZE);
                match self.manager.encode(slot, &mut self.buffers[i][start..end]) {
                    Ok(written) => {
                        self.lens[i] += written;
                        self.offsets[i].push(self.lens[i] as u32);
                    }
                    Err(e) => {
                        warn!(%slot, "Encoding failure, dropping this cycle's unit: {e}");
                        failed |= slot.bit();
                    }
                }
            }

            if let Err(e) = self.manager.advance_all() {
                warn!("Failed to advance channels: {e}");
            }
        }

        let mut published = 0;
        for slot in Slot::all() {
            let i = slot.index();
            if failed & slot.bit() != 0 || self.offsets[i].is_empty() {
                continue;
            }
            self.queue.push(VoicePacket {
                slot,
                section,
                payload: Bytes::copy_from_slice(&self.buffers[i][..self.lens[i]]),
                offsets: self.offsets[i].clone(),
                captured_at,
            });
            published += 1;
        }

        self.clear();
        if published > 0 {
            debug!(published, "Voice cycle published");
        }
        published
    }

    /// Empties every accumulation buffer and offset list.
    pub fn clear(&mut self) {
        self.lens = [0; MAX_LISTENERS];
        self.offsets.iter_mut().for_each(Vec::clear);
    }
}

/// Timer-driven voice dispatch loop.
///
/// `start` moves the [`Producer`] onto a tokio task that runs one cycle every
/// 30 ms. The host calls [`drain`](Self::drain) from its own I/O context to
/// hand finished units to a [`VoiceTransport`]. The loop itself never sends.
pub struct VoiceMainloop {
    queue: Arc<HandoffQueue>,
    enabled: Arc<AtomicBool>,
    section: Arc<AtomicU64>,
    state: AtomicU8,
    producer: Mutex<Option<Producer>>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl VoiceMainloop {
    pub fn new(
        manager: Arc<AudioManager>,
        roster: Arc<dyn ListenerRoster>,
        config: &MainloopConfig,
    ) -> Self {
        let queue = Arc::new(HandoffQueue::new(config.max_queued_packets));
        let enabled = Arc::new(AtomicBool::new(true));
        let section = Arc::new(AtomicU64::new(0));
        let producer = Producer::new(
            manager,
            roster,
            queue.clone(),
            enabled.clone(),
            section.clone(),
        );

        Self {
            queue,
            enabled,
            section,
            state: AtomicU8::new(MainloopState::Idle as u8),
            producer: Mutex::new(Some(producer)),
            task: Mutex::new(None),
            cancel_token: CancellationToken::new(),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }

    /// Builds the loop and starts it immediately.
    pub fn start(
        manager: Arc<AudioManager>,
        roster: Arc<dyn ListenerRoster>,
        config: &MainloopConfig,
    ) -> Result<Self> {
        let mainloop = Self::new(manager, roster, config);
        mainloop.spawn()?;
        Ok(mainloop)
    }

    /// Moves the producer onto the tokio runtime.
    pub fn spawn(&self) -> Result<()> {
        let producer = self
            .producer
            .lock()
            .take()
            .ok_or(AudioError::InvalidState("VoiceMainloop"))?;

        self.state
            .store(MainloopState::Running as u8, Ordering::Release);
        let cancel_token = self.cancel_token.clone();
        *self.task.lock() = Some(tokio::spawn(cycle_loop(producer, cancel_token)));
        info!("Voice mainloop started");
        Ok(())
    }

    /// Runs a single cycle on the caller's thread. Only valid before `spawn`.
    pub fn run_cycle(&self) -> Result<usize> {
        let mut producer = self.producer.lock();
        let producer = producer
            .as_mut()
            .ok_or(AudioError::InvalidState("VoiceMainloop"))?;
        Ok(producer.run_cycle())
    }

    /// Disabled cycles are skipped entirely.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        debug!(enabled, "Voice mainloop toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> MainloopState {
        MainloopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Section number of the latest cycle. Zero before the first one; the
    /// first cycle is section 1.
    pub fn section(&self) -> u64 {
        self.section.load(Ordering::Acquire)
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Sends every queued unit through `transport`, returning how many were
    /// released. A failed send is logged and the unit is released anyway.
    pub fn drain(&self, transport: &mut dyn VoiceTransport) -> usize {
        let mut released = 0;
        while let Some(packet) = self.queue.try_pop() {
            if let Err(e) = transport.send(&packet) {
                warn!(
                    slot = %packet.slot,
                    section = packet.section,
                    "Transport send failed: {e}"
                );
            }
            released += 1;
        }
        released
    }

    /// Stops scheduling, waits for the in-flight cycle and discards every
    /// queued unit.
    ///
    /// A cycle still running past the timeout cannot publish anymore: the
    /// queue is closed before this returns.
    pub async fn shutdown(&self) {
        let previous = self
            .state
            .swap(MainloopState::Stopped as u8, Ordering::AcqRel);
        if MainloopState::from_u8(previous) == MainloopState::Stopped {
            return;
        }
        self.cancel_token.cancel();

        let task = self.task.lock().take();
        if let Some(mut task) = task {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Voice mainloop task failed: {e}"),
                Err(_) => {
                    warn!(
                        timeout_ms = self.shutdown_timeout.as_millis() as u64,
                        "Voice mainloop did not stop in time, aborting"
                    );
                    task.abort();
                }
            }
        }
        self.producer.lock().take();

        let discarded = self.queue.close();
        info!(discarded, "Voice mainloop stopped");
    }
}

impl Drop for VoiceMainloop {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn cycle_loop(mut producer: Producer, cancel_token: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_millis(PACKET_INTERVAL_MS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                if cancel_token.is_cancelled() {
                    break;
                }
                if catch_unwind(AssertUnwindSafe(|| producer.run_cycle())).is_err() {
                    error!("Voice cycle panicked, continuing with the next one");
                    producer.clear();
                }
            }
        }
    }
    debug!("Voice cycle loop exited");
}
