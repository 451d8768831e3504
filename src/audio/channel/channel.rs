use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
};

use parking_lot::RwLock;
use tracing::debug;

use super::reset::CodecReset;
use crate::{
    audio::{
        constants::MAX_LISTENERS,
        source::{AudioSource, Frame},
    },
    common::{
        errors::{AudioError, Result},
        types::Slot,
    },
};

/// A named audio lane playing one shared source for up to 64 listeners.
///
/// Each listener slot owns its own cursor, pause, mute and volume state.
/// Every piece of per-slot state is a plain atomic, so control calls from any
/// thread are single scalar writes that the producer picks up on its next
/// cycle.
///
/// Operations that make the encoder history stale return a [`CodecReset`].
pub struct AudioChannel {
    id: String,
    source: RwLock<Option<Arc<dyn AudioSource>>>,
    // cursor in the low bits, FINISHED once advance ran past the last frame
    positions: [AtomicU64; MAX_LISTENERS],
    volumes: [AtomicU32; MAX_LISTENERS], // f32 bits
    paused: [AtomicBool; MAX_LISTENERS],
    muted: [AtomicBool; MAX_LISTENERS],
    disposed: AtomicBool,
}

const FINISHED: u64 = 1 << 63;

#[inline]
fn cursor_of(position: u64) -> usize {
    (position & !FINISHED) as usize
}

impl AudioChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: RwLock::new(None),
            positions: std::array::from_fn(|_| AtomicU64::new(0)),
            volumes: std::array::from_fn(|_| AtomicU32::new(1.0f32.to_bits())),
            paused: std::array::from_fn(|_| AtomicBool::new(true)),
            muted: std::array::from_fn(|_| AtomicBool::new(false)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(AudioError::InvalidState("AudioChannel"))
        } else {
            Ok(())
        }
    }

    /// Replaces the source. Cursors are kept; every encoder must be reset.
    pub fn set_source(&self, source: Arc<dyn AudioSource>) -> Result<CodecReset> {
        self.ensure_live()?;
        debug!(channel = %self.id, frames = ?source.frame_count(), "Source replaced");
        *self.source.write() = Some(source);
        for position in &self.positions {
            position.fetch_and(!FINISHED, Ordering::AcqRel);
        }
        Ok(CodecReset::All)
    }

    pub fn has_source(&self) -> bool {
        self.source.read().is_some()
    }

    pub fn has_frame(&self, slot: Slot) -> Result<bool> {
        self.ensure_live()?;
        let i = slot.index();
        if self.paused[i].load(Ordering::Acquire) || self.muted[i].load(Ordering::Acquire) {
            return Ok(false);
        }
        let position = self.positions[i].load(Ordering::Acquire);
        if position & FINISHED != 0 {
            return Ok(false);
        }

        Ok(self
            .source
            .read()
            .as_ref()
            .is_some_and(|source| source.has_frame(cursor_of(position))))
    }

    pub fn get_frame(&self, slot: Slot) -> Result<Frame> {
        self.ensure_live()?;
        let source = self
            .source
            .read()
            .clone()
            .ok_or(AudioError::InvalidState("AudioChannel without source"))?;
        let cursor = cursor_of(self.positions[slot.index()].load(Ordering::Acquire));
        Ok(Frame::from_source(source, cursor))
    }

    /// Moves every non-paused slot one frame forward.
    ///
    /// Muted slots advance too. A slot whose source has no frame at
    /// `cursor + 1` stays on its last valid cursor and is marked finished.
    ///
    /// Each step is a compare-exchange on the slot's position, so a
    /// concurrent `reset` or `play` always wins over it.
    pub fn advance(&self) -> Result<()> {
        self.ensure_live()?;
        let guard = self.source.read();
        let Some(source) = guard.as_ref() else {
            return Ok(());
        };

        for i in 0..MAX_LISTENERS {
            if self.paused[i].load(Ordering::Acquire) {
                continue;
            }
            let position = self.positions[i].load(Ordering::Acquire);
            if position & FINISHED != 0 {
                continue;
            }
            let next = if source.has_frame(cursor_of(position) + 1) {
                position + 1
            } else {
                position | FINISHED
            };
            let _ = self.positions[i].compare_exchange(
                position,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
        Ok(())
    }

    /// Rewinds the slot to the first frame.
    pub fn reset(&self, slot: Slot) -> Result<CodecReset> {
        self.ensure_live()?;
        self.positions[slot.index()].store(0, Ordering::Release);
        Ok(CodecReset::Slot(slot))
    }

    pub fn reset_all(&self) -> Result<CodecReset> {
        self.ensure_live()?;
        for position in &self.positions {
            position.store(0, Ordering::Release);
        }
        Ok(CodecReset::All)
    }

    /// Rewinds and resumes.
    pub fn play(&self, slot: Slot) -> Result<CodecReset> {
        let reset = self.reset(slot)?;
        self.resume(slot)?;
        Ok(reset)
    }

    pub fn play_all(&self) -> Result<CodecReset> {
        let reset = self.reset_all()?;
        self.resume_all()?;
        Ok(reset)
    }

    /// Pauses and rewinds.
    pub fn stop(&self, slot: Slot) -> Result<CodecReset> {
        self.pause(slot)?;
        self.reset(slot)
    }

    pub fn stop_all(&self) -> Result<CodecReset> {
        self.pause_all()?;
        self.reset_all()
    }

    pub fn pause(&self, slot: Slot) -> Result<()> {
        self.store_flag(&self.paused, Some(slot), true)
    }

    pub fn pause_all(&self) -> Result<()> {
        self.store_flag(&self.paused, None, true)
    }

    pub fn resume(&self, slot: Slot) -> Result<()> {
        self.store_flag(&self.paused, Some(slot), false)
    }

    pub fn resume_all(&self) -> Result<()> {
        self.store_flag(&self.paused, None, false)
    }

    pub fn mute(&self, slot: Slot) -> Result<()> {
        self.store_flag(&self.muted, Some(slot), true)
    }

    pub fn mute_all(&self) -> Result<()> {
        self.store_flag(&self.muted, None, true)
    }

    pub fn unmute(&self, slot: Slot) -> Result<()> {
        self.store_flag(&self.muted, Some(slot), false)
    }

    pub fn unmute_all(&self) -> Result<()> {
        self.store_flag(&self.muted, None, false)
    }

    fn store_flag(
        &self,
        flags: &[AtomicBool; MAX_LISTENERS],
        slot: Option<Slot>,
        value: bool,
    ) -> Result<()> {
        self.ensure_live()?;
        match slot {
            Some(slot) => flags[slot.index()].store(value, Ordering::Release),
            None => flags.iter().for_each(|f| f.store(value, Ordering::Release)),
        }
        Ok(())
    }

    pub fn volume(&self, slot: Slot) -> Result<f32> {
        self.ensure_live()?;
        Ok(f32::from_bits(
            self.volumes[slot.index()].load(Ordering::Acquire),
        ))
    }

    pub fn set_volume(&self, slot: Slot, volume: f32) -> Result<()> {
        self.ensure_live()?;
        validate_volume(volume)?;
        self.volumes[slot.index()].store(volume.to_bits(), Ordering::Release);
        Ok(())
    }

    pub fn set_volume_all(&self, volume: f32) -> Result<()> {
        self.ensure_live()?;
        validate_volume(volume)?;
        for v in &self.volumes {
            v.store(volume.to_bits(), Ordering::Release);
        }
        Ok(())
    }

    pub fn cursor(&self, slot: Slot) -> Result<usize> {
        self.ensure_live()?;
        Ok(cursor_of(
            self.positions[slot.index()].load(Ordering::Acquire),
        ))
    }

    pub fn is_paused(&self, slot: Slot) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.paused[slot.index()].load(Ordering::Acquire))
    }

    pub fn is_muted(&self, slot: Slot) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.muted[slot.index()].load(Ordering::Acquire))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Drops the source and restores every slot to its initial state.
    /// Later calls fail with `InvalidState`.
    ///
    /// Only the manager disposes channels, after removing them from its list.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.source.write().take();
        for i in 0..MAX_LISTENERS {
            self.positions[i].store(0, Ordering::Release);
            self.volumes[i].store(1.0f32.to_bits(), Ordering::Release);
            self.paused[i].store(true, Ordering::Release);
            self.muted[i].store(false, Ordering::Release);
        }
        debug!(channel = %self.id, "Channel disposed");
    }
}

fn validate_volume(volume: f32) -> Result<()> {
    if volume.is_finite() && volume >= 0.0 {
        Ok(())
    } else {
        Err(AudioError::invalid_argument(format!(
            "volume must be finite and non-negative, got {volume}"
        )))
    }
}

impl std::fmt::Debug for AudioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChannel")
            .field("id", &self.id)
            .field("has_source", &self.has_source())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{constants::FRAME_SIZE, source::PcmSource};

    fn slot(i: usize) -> Slot {
        Slot::new(i).unwrap()
    }

    fn source(frames: usize) -> Arc<dyn AudioSource> {
        let samples = (0..frames * FRAME_SIZE)
            .map(|i| (i / FRAME_SIZE) as i16 + 1)
            .collect();
        Arc::new(PcmSource::from_samples(samples))
    }

    #[test]
    fn new_channel_is_paused_everywhere() {
        let ch = AudioChannel::new("music");
        for s in Slot::all() {
            assert!(ch.is_paused(s).unwrap());
            assert!(!ch.is_muted(s).unwrap());
            assert_eq!(ch.cursor(s).unwrap(), 0);
            assert_eq!(ch.volume(s).unwrap(), 1.0);
        }
        assert!(!ch.has_source());
    }

    #[test]
    fn set_source_requests_reset_for_all_and_stays_silent_until_resume() {
        let ch = AudioChannel::new("music");
        assert_eq!(ch.set_source(source(3)).unwrap(), CodecReset::All);
        assert!(!ch.has_frame(slot(0)).unwrap());

        ch.resume(slot(0)).unwrap();
        assert!(ch.has_frame(slot(0)).unwrap());
        assert!(!ch.has_frame(slot(1)).unwrap());
    }

    #[test]
    fn reset_is_idempotent_and_reports_once_per_call() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(5)).unwrap();
        ch.resume(slot(2)).unwrap();
        ch.advance().unwrap();
        ch.advance().unwrap();
        assert_eq!(ch.cursor(slot(2)).unwrap(), 2);

        assert_eq!(ch.reset(slot(2)).unwrap(), CodecReset::Slot(slot(2)));
        assert_eq!(ch.cursor(slot(2)).unwrap(), 0);
        assert_eq!(ch.reset(slot(2)).unwrap(), CodecReset::Slot(slot(2)));
        assert_eq!(ch.cursor(slot(2)).unwrap(), 0);
    }

    #[test]
    fn mute_keeps_cursor_advancing() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(10)).unwrap();
        ch.resume(slot(0)).unwrap();
        ch.mute(slot(0)).unwrap();

        for _ in 0..4 {
            assert!(!ch.has_frame(slot(0)).unwrap());
            ch.advance().unwrap();
        }
        assert_eq!(ch.cursor(slot(0)).unwrap(), 4);

        ch.unmute(slot(0)).unwrap();
        assert!(ch.has_frame(slot(0)).unwrap());
        assert_eq!(ch.get_frame(slot(0)).unwrap()[0], 5);
    }

    #[test]
    fn paused_slot_does_not_advance() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(4)).unwrap();
        ch.resume(slot(0)).unwrap();
        ch.advance().unwrap();
        assert_eq!(ch.cursor(slot(0)).unwrap(), 1);
        assert_eq!(ch.cursor(slot(1)).unwrap(), 0);
    }

    #[test]
    fn three_frame_source_plays_exactly_three_frames() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(3)).unwrap();
        assert_eq!(ch.play(slot(0)).unwrap(), CodecReset::Slot(slot(0)));

        let mut heard = Vec::new();
        for _ in 0..5 {
            if ch.has_frame(slot(0)).unwrap() {
                heard.push(ch.get_frame(slot(0)).unwrap()[0]);
            }
            ch.advance().unwrap();
        }
        assert_eq!(heard, vec![1, 2, 3]);
        assert_eq!(ch.cursor(slot(0)).unwrap(), 2);

        let _ = ch.play(slot(0)).unwrap();
        assert!(ch.has_frame(slot(0)).unwrap());
        assert_eq!(ch.get_frame(slot(0)).unwrap()[0], 1);
    }

    #[test]
    fn play_racing_the_final_advance_is_never_lost() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(2)).unwrap();

        for _ in 0..2_000 {
            let _ = ch.play(slot(0)).unwrap();
            ch.advance().unwrap();
            assert_eq!(ch.cursor(slot(0)).unwrap(), 1);

            let barrier = std::sync::Barrier::new(2);
            std::thread::scope(|s| {
                s.spawn(|| {
                    barrier.wait();
                    ch.advance().unwrap();
                });
                barrier.wait();
                let _ = ch.play(slot(0)).unwrap();
            });

            // whichever order won, the replay must be audible
            assert!(ch.has_frame(slot(0)).unwrap());
            assert!(ch.cursor(slot(0)).unwrap() <= 1);
        }
    }

    #[test]
    fn set_source_revives_finished_slots_in_place() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(2)).unwrap();
        let _ = ch.play(slot(0)).unwrap();
        for _ in 0..3 {
            ch.advance().unwrap();
        }
        assert!(!ch.has_frame(slot(0)).unwrap());

        let _ = ch.set_source(source(4)).unwrap();
        assert_eq!(ch.cursor(slot(0)).unwrap(), 1);
        assert!(ch.has_frame(slot(0)).unwrap());
        ch.advance().unwrap();
        assert_eq!(ch.cursor(slot(0)).unwrap(), 2);
    }

    #[test]
    fn stop_pauses_and_rewinds() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(4)).unwrap();
        let _ = ch.play_all().unwrap();
        ch.advance().unwrap();

        assert_eq!(ch.stop(slot(3)).unwrap(), CodecReset::Slot(slot(3)));
        assert!(ch.is_paused(slot(3)).unwrap());
        assert_eq!(ch.cursor(slot(3)).unwrap(), 0);
        assert_eq!(ch.cursor(slot(4)).unwrap(), 1);

        assert_eq!(ch.stop_all().unwrap(), CodecReset::All);
        assert!(Slot::all().all(|s| ch.is_paused(s).unwrap()));
    }

    #[test]
    fn volume_must_be_finite_and_non_negative() {
        let ch = AudioChannel::new("music");
        ch.set_volume(slot(1), 0.5).unwrap();
        assert_eq!(ch.volume(slot(1)).unwrap(), 0.5);
        assert!(matches!(
            ch.set_volume(slot(1), -0.1),
            Err(AudioError::InvalidArgument(_))
        ));
        assert!(matches!(
            ch.set_volume_all(f32::NAN),
            Err(AudioError::InvalidArgument(_))
        ));
        assert_eq!(ch.volume(slot(1)).unwrap(), 0.5);
    }

    #[test]
    fn get_frame_without_source_is_invalid_state() {
        let ch = AudioChannel::new("music");
        assert!(matches!(
            ch.get_frame(slot(0)),
            Err(AudioError::InvalidState(_))
        ));
    }

    #[test]
    fn every_operation_fails_after_dispose() {
        let ch = AudioChannel::new("music");
        let _ = ch.set_source(source(2)).unwrap();
        let _ = ch.play_all().unwrap();
        ch.dispose();

        assert!(ch.is_disposed());
        assert!(!ch.has_source());
        assert!(matches!(ch.has_frame(slot(0)), Err(AudioError::InvalidState(_))));
        assert!(matches!(ch.advance(), Err(AudioError::InvalidState(_))));
        assert!(matches!(ch.play(slot(0)), Err(AudioError::InvalidState(_))));
        assert!(matches!(
            ch.set_source(source(1)),
            Err(AudioError::InvalidState(_))
        ));
        assert!(matches!(ch.mute_all(), Err(AudioError::InvalidState(_))));
    }
}
