use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::info;

use crate::{
    audio::{
        AudioChannel, AudioManager, AudioSource, CodecReset, PcmDecoder, PcmSource, VoiceChannel,
    },
    common::{
        errors::{AudioError, Result},
        types::Slot,
    },
    configs::AudioConfig,
};

/// Public control surface shared by every caller of the audio core.
///
/// Safe to use from any thread. Codec resets produced by channel operations
/// are forwarded to the manager automatically.
pub struct AudioApi {
    manager: Arc<AudioManager>,
    decoder: PcmDecoder,
    disposed: AtomicBool,
}

impl AudioApi {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_manager(Arc::new(AudioManager::new(
            config.opus_complexity,
        )?)))
    }

    pub fn with_manager(manager: Arc<AudioManager>) -> Self {
        Self {
            manager,
            decoder: PcmDecoder::new(),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(AudioError::InvalidState("AudioApi"))
        } else {
            Ok(())
        }
    }

    pub fn manager(&self) -> &Arc<AudioManager> {
        &self.manager
    }

    /// Controller for the channel `name`, created on first use.
    pub fn use_channel(&self, name: &str) -> Result<ChannelController> {
        self.ensure_live()?;
        let channel = self.manager.use_channel(name)?;
        Ok(ChannelController {
            channel,
            manager: self.manager.clone(),
        })
    }

    pub fn add_custom_channel(&self, channel: Arc<dyn VoiceChannel>) -> Result<()> {
        self.ensure_live()?;
        self.manager.add_custom_channel(channel)
    }

    pub fn remove_custom_channel(&self, id: &str) -> Result<bool> {
        self.ensure_live()?;
        self.manager.remove_custom_channel(id)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Arc<PcmSource>> {
        self.ensure_live()?;
        Ok(Arc::new(PcmSource::from_samples(self.decoder.decode(bytes)?)))
    }

    pub async fn decode_async(&self, bytes: Vec<u8>) -> Result<Arc<PcmSource>> {
        self.ensure_live()?;
        let samples = self.decoder.decode_async(bytes).await?;
        Ok(Arc::new(PcmSource::from_samples(samples)))
    }

    pub fn decode_file(&self, path: impl Into<PathBuf>) -> Result<Arc<PcmSource>> {
        self.ensure_live()?;
        let samples = self.decoder.decode_file(path.into())?;
        Ok(Arc::new(PcmSource::from_samples(samples)))
    }

    pub async fn decode_file_async(&self, path: impl Into<PathBuf>) -> Result<Arc<PcmSource>> {
        self.ensure_live()?;
        let samples = self.decoder.decode_file_async(path).await?;
        Ok(Arc::new(PcmSource::from_samples(samples)))
    }

    pub fn decode_url(&self, url: &str) -> Result<Arc<PcmSource>> {
        self.ensure_live()?;
        Ok(Arc::new(PcmSource::from_samples(
            self.decoder.decode_url(url)?,
        )))
    }

    pub async fn decode_url_async(&self, url: &str) -> Result<Arc<PcmSource>> {
        self.ensure_live()?;
        let samples = self.decoder.decode_url_async(url).await?;
        Ok(Arc::new(PcmSource::from_samples(samples)))
    }

    pub fn set_complexity(&self, complexity: u8) -> Result<()> {
        self.ensure_live()?;
        self.manager.set_complexity(complexity)
    }

    /// Applies a reloaded `[audio]` section at runtime.
    pub fn apply_config(&self, config: &AudioConfig) -> Result<()> {
        self.ensure_live()?;
        config.validate()?;
        self.manager.set_complexity(config.opus_complexity)?;
        info!(complexity = config.opus_complexity, "Audio config applied");
        Ok(())
    }

    /// Disposes the manager and every channel. Later calls fail.
    pub fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.manager.dispose();
        info!("Audio API shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Handle on one standard channel.
///
/// Mirrors the [`AudioChannel`] operations and hands every resulting
/// [`CodecReset`] to the manager.
#[derive(Clone)]
pub struct ChannelController {
    channel: Arc<AudioChannel>,
    manager: Arc<AudioManager>,
}

impl ChannelController {
    fn apply(&self, reset: Result<CodecReset>) -> Result<()> {
        self.manager.reset_codec(reset?)
    }

    pub fn id(&self) -> &str {
        self.channel.id()
    }

    pub fn channel(&self) -> &Arc<AudioChannel> {
        &self.channel
    }

    pub fn set_source(&self, source: Arc<dyn AudioSource>) -> Result<()> {
        self.apply(self.channel.set_source(source))
    }

    pub fn has_source(&self) -> bool {
        self.channel.has_source()
    }

    pub fn has_frame(&self, slot: Slot) -> Result<bool> {
        self.channel.has_frame(slot)
    }

    pub fn play(&self, slot: Slot) -> Result<()> {
        self.apply(self.channel.play(slot))
    }

    pub fn play_all(&self) -> Result<()> {
        self.apply(self.channel.play_all())
    }

    pub fn stop(&self, slot: Slot) -> Result<()> {
        self.apply(self.channel.stop(slot))
    }

    pub fn stop_all(&self) -> Result<()> {
        self.apply(self.channel.stop_all())
    }

    pub fn reset(&self, slot: Slot) -> Result<()> {
        self.apply(self.channel.reset(slot))
    }

    pub fn reset_all(&self) -> Result<()> {
        self.apply(self.channel.reset_all())
    }

    pub fn pause(&self, slot: Slot) -> Result<()> {
        self.channel.pause(slot)
    }

    pub fn pause_all(&self) -> Result<()> {
        self.channel.pause_all()
    }

    pub fn resume(&self, slot: Slot) -> Result<()> {
        self.channel.resume(slot)
    }

    pub fn resume_all(&self) -> Result<()> {
        self.channel.resume_all()
    }

    pub fn mute(&self, slot: Slot) -> Result<()> {
        self.channel.mute(slot)
    }

    pub fn mute_all(&self) -> Result<()> {
        self.channel.mute_all()
    }

    pub fn unmute(&self, slot: Slot) -> Result<()> {
        self.channel.unmute(slot)
    }

    pub fn unmute_all(&self) -> Result<()> {
        self.channel.unmute_all()
    }

    pub fn volume(&self, slot: Slot) -> Result<f32> {
        self.channel.volume(slot)
    }

    pub fn set_volume(&self, slot: Slot, volume: f32) -> Result<()> {
        self.channel.set_volume(slot, volume)
    }

    pub fn set_volume_all(&self, volume: f32) -> Result<()> {
        self.channel.set_volume_all(volume)
    }

    pub fn cursor(&self, slot: Slot) -> Result<usize> {
        self.channel.cursor(slot)
    }

    pub fn is_paused(&self, slot: Slot) -> Result<bool> {
        self.channel.is_paused(slot)
    }

    pub fn is_muted(&self, slot: Slot) -> Result<bool> {
        self.channel.is_muted(slot)
    }

    /// Removes the channel from the manager and disposes it.
    pub fn dispose(&self) -> Result<bool> {
        self.manager.dispose_channel(self.channel.id())
    }
}
