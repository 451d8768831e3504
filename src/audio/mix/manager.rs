use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use super::accumulate::mix_frame;
use crate::{
    audio::{
        channel::{AudioChannel, CodecReset, VoiceChannel},
        codec::EncoderBank,
        constants::FRAME_SIZE,
    },
    common::{
        errors::{AudioError, Result},
        types::Slot,
    },
    configs::validate_complexity,
};

struct MixState {
    frame: [i16; FRAME_SIZE],
    encoders: EncoderBank,
}

/// Owns every channel, one Opus encoder per listener and the scratch mix
/// buffer.
///
/// Channels are iterated in insertion order, standard channels first. The
/// encoders and the scratch buffer live behind one mutex that only the
/// producer contends for in practice. Control threads talk to the encoders
/// through two atomics: the complexity snapshot and the pending reset mask.
pub struct AudioManager {
    channels: RwLock<Vec<Arc<AudioChannel>>>,
    custom: RwLock<Vec<Arc<dyn VoiceChannel>>>,
    state: Mutex<MixState>,
    pending_resets: AtomicU64,
    complexity: AtomicU8,
    disposed: AtomicBool,
}

impl AudioManager {
    pub fn new(complexity: u8) -> Result<Self> {
        validate_complexity(complexity)?;
        Ok(Self {
            channels: RwLock::new(Vec::new()),
            custom: RwLock::new(Vec::new()),
            state: Mutex::new(MixState {
                frame: [0; FRAME_SIZE],
                encoders: EncoderBank::new(),
            }),
            pending_resets: AtomicU64::new(0),
            complexity: AtomicU8::new(complexity),
            disposed: AtomicBool::new(false),
        })
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(AudioError::InvalidState("AudioManager"))
        } else {
            Ok(())
        }
    }

    /// Returns the channel called `name`, creating it on first use.
    pub fn use_channel(&self, name: &str) -> Result<Arc<AudioChannel>> {
        if let Some(channel) = self.channel(name)? {
            return Ok(channel);
        }

        let mut channels = self.channels.write();
        if let Some(channel) = channels.iter().find(|c| c.id() == name) {
            return Ok(channel.clone());
        }
        if self.custom.read().iter().any(|c| c.id() == name) {
            return Err(AudioError::invalid_argument(format!(
                "'{name}' is already a custom channel"
            )));
        }

        let channel = Arc::new(AudioChannel::new(name));
        channels.push(channel.clone());
        debug!(channel = name, "Channel created");
        Ok(channel)
    }

    pub fn channel(&self, name: &str) -> Result<Option<Arc<AudioChannel>>> {
        self.ensure_live()?;
        Ok(self
            .channels
            .read()
            .iter()
            .find(|c| c.id() == name)
            .cloned())
    }

    /// Removes and disposes the channel. Returns whether it existed.
    pub fn dispose_channel(&self, name: &str) -> Result<bool> {
        self.ensure_live()?;
        let removed = {
            let mut channels = self.channels.write();
            channels
                .iter()
                .position(|c| c.id() == name)
                .map(|i| channels.remove(i))
        };
        Ok(match removed {
            Some(channel) => {
                channel.dispose();
                true
            }
            None => false,
        })
    }

    pub fn add_custom_channel(&self, channel: Arc<dyn VoiceChannel>) -> Result<()> {
        self.ensure_live()?;
        let id = channel.id().to_owned();
        let channels = self.channels.read();
        let mut custom = self.custom.write();
        if custom.iter().any(|c| c.id() == id) || channels.iter().any(|c| c.id() == id) {
            return Err(AudioError::invalid_argument(format!(
                "channel '{id}' is already registered"
            )));
        }
        custom.push(channel);
        debug!(channel = %id, "Custom channel registered");
        Ok(())
    }

    /// Unregisters and disposes a custom channel. Returns whether it existed.
    pub fn remove_custom_channel(&self, id: &str) -> Result<bool> {
        self.ensure_live()?;
        let removed = {
            let mut custom = self.custom.write();
            custom
                .iter()
                .position(|c| c.id() == id)
                .map(|i| custom.remove(i))
        };
        Ok(match removed {
            Some(channel) => {
                channel.dispose();
                true
            }
            None => false,
        })
    }

    pub fn channel_count(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.channels.read().len() + self.custom.read().len())
    }

    /// Whether any channel has a frame for `slot` in this sub-tick.
    ///
    /// The first channel error is returned as is.
    pub fn has_frame(&self, slot: Slot) -> Result<bool> {
        self.ensure_live()?;
        for channel in self.channels.read().iter() {
            if channel.has_frame(slot)? {
                return Ok(true);
            }
        }
        for channel in self.custom.read().iter() {
            if channel.has_frame(slot)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Steps every channel once. Must run after all reads of the sub-tick.
    pub fn advance_all(&self) -> Result<()> {
        self.ensure_live()?;
        for channel in self.channels.read().iter() {
            channel.advance()?;
        }
        for channel in self.custom.read().iter() {
            if let Err(e) = channel.advance() {
                warn!(channel = channel.id(), "Custom channel failed to advance: {e}");
            }
            if let Some(reset) = channel.take_reset() {
                self.reset_codec(reset)?;
            }
        }
        Ok(())
    }

    fn fill(&self, slot: Slot, frame: &mut [i16; FRAME_SIZE]) -> Result<()> {
        frame.fill(0);

        for channel in self.channels.read().iter() {
            if !channel.has_frame(slot)? {
                continue;
            }
            let samples = channel.get_frame(slot)?;
            mix_frame(frame, &samples, channel.volume(slot)?);
        }

        for channel in self.custom.read().iter() {
            if !channel.has_frame(slot)? {
                continue;
            }
            mix_frame(frame, &channel.get_frame(slot)?, 1.0);
        }
        Ok(())
    }

    /// Mixes every channel for `slot` into the scratch buffer and returns it.
    ///
    /// The guard borrows the manager's mix state; drop it before encoding.
    pub fn mix(&self, slot: Slot) -> Result<MappedMutexGuard<'_, [i16]>> {
        self.ensure_live()?;
        let mut state = self.state.lock();
        self.fill(slot, &mut state.frame)?;
        Ok(MutexGuard::map(state, |s| &mut s.frame[..]))
    }

    /// Mixes and encodes one frame for `slot`, returning the packet length.
    ///
    /// A pending reset for the slot is applied to its encoder first. A
    /// channel failing to produce its frame fails the whole encode.
    pub fn encode(&self, slot: Slot, out: &mut [u8]) -> Result<usize> {
        self.ensure_live()?;
        let complexity = self.complexity.load(Ordering::Acquire);

        let mut state = self.state.lock();
        let MixState { frame, encoders } = &mut *state;
        self.fill(slot, frame)?;

        let encoder = encoders.encoder_mut(slot, complexity)?;
        apply_pending_reset(&self.pending_resets, slot, || encoder.reset())?;
        encoder.encode(&frame[..], out)
    }

    /// Records a reset for the addressed encoder(s).
    pub fn reset_codec(&self, reset: CodecReset) -> Result<()> {
        self.ensure_live()?;
        self.pending_resets
            .fetch_or(reset.mask(), Ordering::AcqRel);
        Ok(())
    }

    /// Mask of slots whose encoder will be reset before its next encode.
    pub fn pending_resets(&self) -> u64 {
        self.pending_resets.load(Ordering::Acquire)
    }

    /// Stores a new complexity; every encoder applies it before its next encode.
    pub fn set_complexity(&self, complexity: u8) -> Result<()> {
        self.ensure_live()?;
        validate_complexity(complexity)?;
        self.complexity.store(complexity, Ordering::Release);
        Ok(())
    }

    pub fn complexity(&self) -> u8 {
        self.complexity.load(Ordering::Acquire)
    }

    /// Creates every absent encoder and applies `complexity` to all of them.
    pub fn configure_encoders(&self, complexity: u8) -> Result<()> {
        self.ensure_live()?;
        self.set_complexity(complexity)?;
        self.state.lock().encoders.configure(complexity)
    }

    pub fn live_encoders(&self) -> usize {
        self.state.lock().encoders.live_count()
    }

    /// Disposes every channel and drops the encoders.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for channel in self.channels.write().drain(..) {
            channel.dispose();
        }
        for channel in self.custom.write().drain(..) {
            channel.dispose();
        }
        self.state.lock().encoders.clear();
        self.pending_resets.store(0, Ordering::Release);
        debug!("Audio manager disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Runs `reset` when `slot` has a pending request. A failed reset leaves the
/// request pending for the next encode.
fn apply_pending_reset(
    pending: &AtomicU64,
    slot: Slot,
    reset: impl FnOnce() -> Result<()>,
) -> Result<()> {
    let previous = pending.fetch_and(!slot.bit(), Ordering::AcqRel);
    if previous & slot.bit() == 0 {
        return Ok(());
    }
    reset().inspect_err(|_| {
        pending.fetch_or(slot.bit(), Ordering::AcqRel);
    })
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        constants::OPUS_BUFFER_SIZE,
        source::{Frame, PcmSource},
    };

    fn slot(i: usize) -> Slot {
        Slot::new(i).unwrap()
    }

    fn pattern_source(a: i16, b: i16, frames: usize) -> Arc<PcmSource> {
        let samples = (0..frames * FRAME_SIZE)
            .map(|i| if i % 2 == 0 { a } else { b })
            .collect();
        Arc::new(PcmSource::from_samples(samples))
    }

    struct ConstChannel {
        id: String,
        frame: Arc<[i16]>,
        reset: AtomicBool,
        disposed: AtomicBool,
    }

    impl ConstChannel {
        fn new(id: &str, value: i16) -> Self {
            Self {
                id: id.to_owned(),
                frame: vec![value; FRAME_SIZE].into(),
                reset: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }
        }
    }

    impl VoiceChannel for ConstChannel {
        fn id(&self) -> &str {
            &self.id
        }

        fn has_frame(&self, _slot: Slot) -> Result<bool> {
            Ok(true)
        }

        fn get_frame(&self, _slot: Slot) -> Result<Frame> {
            Ok(Frame::from(self.frame.clone()))
        }

        fn advance(&self) -> Result<()> {
            Ok(())
        }

        fn take_reset(&self) -> Option<CodecReset> {
            self.reset
                .swap(false, Ordering::AcqRel)
                .then_some(CodecReset::Slot(Slot::new(7).ok()?))
        }

        fn dispose(&self) {
            self.disposed.store(true, Ordering::Release);
        }
    }

    #[test]
    fn use_channel_returns_the_same_instance() {
        let manager = AudioManager::new(10).unwrap();
        let a = manager.use_channel("music").unwrap();
        let b = manager.use_channel("music").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.channel_count().unwrap(), 1);
    }

    #[test]
    fn two_channels_sum_per_sample() {
        let manager = AudioManager::new(10).unwrap();
        for name in ["a", "b"] {
            let ch = manager.use_channel(name).unwrap();
            let _ = ch.set_source(pattern_source(100, -100, 2)).unwrap();
            ch.resume_all().unwrap();
        }

        let mixed = manager.mix(slot(0)).unwrap();
        assert_eq!(&mixed[..4], &[200, -200, 200, -200]);
    }

    #[test]
    fn mix_saturates() {
        let manager = AudioManager::new(10).unwrap();
        for name in ["a", "b"] {
            let ch = manager.use_channel(name).unwrap();
            let _ = ch.set_source(pattern_source(32000, -32000, 1)).unwrap();
            ch.resume(slot(1)).unwrap();
        }

        let mixed = manager.mix(slot(1)).unwrap();
        assert_eq!(&mixed[..2], &[i16::MAX, i16::MIN]);
    }

    #[test]
    fn per_listener_volume_and_silence() {
        let manager = AudioManager::new(10).unwrap();
        let ch = manager.use_channel("music").unwrap();
        let _ = ch.set_source(pattern_source(1000, -1000, 1)).unwrap();
        ch.resume_all().unwrap();
        ch.set_volume(slot(0), 0.5).unwrap();
        ch.mute(slot(2)).unwrap();

        assert_eq!(&manager.mix(slot(0)).unwrap()[..2], &[500, -500]);
        assert_eq!(&manager.mix(slot(1)).unwrap()[..2], &[1000, -1000]);
        assert!(manager.mix(slot(2)).unwrap().iter().all(|&s| s == 0));
        assert!(!manager.has_frame(slot(2)).unwrap());
    }

    #[test]
    fn custom_channel_mixes_at_full_volume() {
        let manager = AudioManager::new(10).unwrap();
        let ch = manager.use_channel("music").unwrap();
        let _ = ch.set_source(pattern_source(10, 10, 1)).unwrap();
        ch.resume_all().unwrap();
        ch.set_volume_all(0.0).unwrap();
        manager
            .add_custom_channel(Arc::new(ConstChannel::new("tone", 42)))
            .unwrap();

        assert!(manager.has_frame(slot(5)).unwrap());
        assert!(manager.mix(slot(5)).unwrap().iter().all(|&s| s == 42));
    }

    #[test]
    fn duplicate_custom_channel_is_rejected() {
        let manager = AudioManager::new(10).unwrap();
        manager
            .add_custom_channel(Arc::new(ConstChannel::new("tone", 1)))
            .unwrap();
        assert!(matches!(
            manager.add_custom_channel(Arc::new(ConstChannel::new("tone", 2))),
            Err(AudioError::InvalidArgument(_))
        ));

        manager.use_channel("music").unwrap();
        assert!(matches!(
            manager.add_custom_channel(Arc::new(ConstChannel::new("music", 2))),
            Err(AudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn remove_custom_channel_disposes_it() {
        let manager = AudioManager::new(10).unwrap();
        let tone = Arc::new(ConstChannel::new("tone", 1));
        manager.add_custom_channel(tone.clone()).unwrap();

        assert!(manager.remove_custom_channel("tone").unwrap());
        assert!(tone.disposed.load(Ordering::Acquire));
        assert!(!manager.remove_custom_channel("tone").unwrap());
        assert!(!manager.has_frame(slot(0)).unwrap());
    }

    #[test]
    fn custom_channel_reset_request_is_recorded_on_advance() {
        let manager = AudioManager::new(10).unwrap();
        let tone = Arc::new(ConstChannel::new("tone", 1));
        manager.add_custom_channel(tone.clone()).unwrap();
        tone.reset.store(true, Ordering::Release);

        manager.advance_all().unwrap();
        assert_eq!(manager.pending_resets(), slot(7).bit());
        manager.advance_all().unwrap();
        assert_eq!(manager.pending_resets(), slot(7).bit());
    }

    #[test]
    fn three_frame_music_on_listener_five() {
        let manager = AudioManager::new(10).unwrap();
        let music = manager.use_channel("music").unwrap();
        manager
            .reset_codec(music.set_source(pattern_source(1, 1, 3)).unwrap())
            .unwrap();
        manager.reset_codec(music.play(slot(5)).unwrap()).unwrap();

        let mut heard = Vec::new();
        for _ in 0..5 {
            heard.push(manager.has_frame(slot(5)).unwrap());
            manager.advance_all().unwrap();
        }
        assert_eq!(heard, vec![true, true, true, false, false]);
        assert_eq!(music.cursor(slot(5)).unwrap(), 2);
    }

    #[test]
    fn reset_is_applied_once_to_the_addressed_encoder() {
        let manager = AudioManager::new(10).unwrap();
        manager.reset_codec(CodecReset::Slot(slot(3))).unwrap();
        assert_eq!(manager.pending_resets(), slot(3).bit());

        let mut out = [0u8; OPUS_BUFFER_SIZE];
        manager.encode(slot(4), &mut out).unwrap();
        assert_eq!(manager.pending_resets(), slot(3).bit());
        manager.encode(slot(3), &mut out).unwrap();
        assert_eq!(manager.pending_resets(), 0);

        manager.reset_codec(CodecReset::All).unwrap();
        assert_eq!(manager.pending_resets(), u64::MAX);
    }

    #[test]
    fn encode_silence_produces_a_packet() {
        let manager = AudioManager::new(5).unwrap();
        let mut out = [0u8; OPUS_BUFFER_SIZE];
        let len = manager.encode(slot(0), &mut out).unwrap();
        assert!(len > 0);
        assert_eq!(manager.live_encoders(), 1);
    }

    #[test]
    fn complexity_is_validated_and_configures_encoders() {
        assert!(matches!(
            AudioManager::new(11),
            Err(AudioError::InvalidArgument(_))
        ));

        let manager = AudioManager::new(10).unwrap();
        assert!(manager.set_complexity(11).is_err());
        assert_eq!(manager.complexity(), 10);

        manager.configure_encoders(3).unwrap();
        assert_eq!(manager.complexity(), 3);
        assert_eq!(manager.live_encoders(), 64);
    }

    #[test]
    fn dispose_releases_everything() {
        let manager = AudioManager::new(10).unwrap();
        let music = manager.use_channel("music").unwrap();
        manager.dispose();

        assert!(manager.is_disposed());
        assert!(music.is_disposed());
        let invalid = |r: Result<()>| matches!(r, Err(AudioError::InvalidState(_)));
        assert!(invalid(manager.use_channel("music").map(drop)));
        assert!(invalid(manager.channel("music").map(drop)));
        assert!(invalid(manager.channel_count().map(drop)));
        assert!(invalid(manager.has_frame(slot(0)).map(drop)));
        assert!(invalid(manager.dispose_channel("music").map(drop)));
        assert!(invalid(manager.remove_custom_channel("tone").map(drop)));
        assert!(invalid(manager.reset_codec(CodecReset::All)));
        assert!(invalid(manager.set_complexity(3)));
        assert_eq!(manager.complexity(), 10);
    }

    struct FailingChannel;

    impl VoiceChannel for FailingChannel {
        fn id(&self) -> &str {
            "failing"
        }

        fn has_frame(&self, slot: Slot) -> Result<bool> {
            if slot.index() == 2 {
                Err(AudioError::InvalidState("failing"))
            } else {
                Ok(false)
            }
        }

        fn get_frame(&self, _slot: Slot) -> Result<Frame> {
            Err(AudioError::InvalidState("failing"))
        }

        fn advance(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn channel_errors_reach_the_caller() {
        let manager = AudioManager::new(10).unwrap();
        let music = manager.use_channel("music").unwrap();
        let _ = music.set_source(pattern_source(5, 5, 2)).unwrap();
        music.resume_all().unwrap();
        manager.add_custom_channel(Arc::new(FailingChannel)).unwrap();

        // a standard channel already answered yes for slot 0
        assert!(manager.has_frame(slot(0)).unwrap());
        music.pause(slot(2)).unwrap();
        assert!(matches!(
            manager.has_frame(slot(2)),
            Err(AudioError::InvalidState(_))
        ));
        assert!(manager.mix(slot(2)).is_err());
        let mut out = [0u8; OPUS_BUFFER_SIZE];
        assert!(manager.encode(slot(2), &mut out).is_err());
        assert!(manager.encode(slot(3), &mut out).is_ok());
    }

    #[test]
    fn failed_reset_stays_pending() {
        let pending = AtomicU64::new(slot(4).bit() | slot(6).bit());

        let failed = apply_pending_reset(&pending, slot(4), || Err(AudioError::codec("boom")));
        assert!(failed.is_err());
        assert_eq!(pending.load(Ordering::Acquire), slot(4).bit() | slot(6).bit());

        let mut calls = 0;
        apply_pending_reset(&pending, slot(4), || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(pending.load(Ordering::Acquire), slot(6).bit());

        apply_pending_reset(&pending, slot(4), || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn control_calls_during_cycles_take_effect_next_sub_tick() {
        let manager = Arc::new(AudioManager::new(10).unwrap());
        let music = manager.use_channel("music").unwrap();
        let src = pattern_source(7, 7, 10_000);
        let _ = music.set_source(src.clone()).unwrap();
        let rounds = 200;
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut out = [0u8; OPUS_BUFFER_SIZE];
                while !done.load(Ordering::Acquire) {
                    for i in 0..4 {
                        let _ = manager.has_frame(slot(i)).unwrap();
                        manager.encode(slot(i), &mut out).unwrap();
                    }
                    manager.advance_all().unwrap();
                }
            });

            for round in 0..rounds {
                let target = slot(round % 4);
                manager.reset_codec(music.play(target).unwrap()).unwrap();
                assert!(manager.has_frame(target).unwrap());
                manager.set_complexity((round % 11) as u8).unwrap();
                manager.reset_codec(music.stop(target).unwrap()).unwrap();
                assert!(!manager.has_frame(target).unwrap());
                if round % 50 == 0 {
                    manager
                        .reset_codec(music.set_source(src.clone()).unwrap())
                        .unwrap();
                }
            }
            done.store(true, Ordering::Release);
        });

        assert!(manager.complexity() <= 10);
        let mut out = [0u8; OPUS_BUFFER_SIZE];
        manager.reset_codec(music.play(slot(1)).unwrap()).unwrap();
        assert!(manager.has_frame(slot(1)).unwrap());
        assert!(manager.encode(slot(1), &mut out).unwrap() > 0);
    }
}
