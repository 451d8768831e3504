use audiopus::{
    Application, Channels, SampleRate,
    coder::{Encoder as OpusEncoder, GenericCtl},
};

use crate::{
    audio::constants::{DEFAULT_OPUS_COMPLEXITY, FRAME_SIZE},
    common::errors::{AudioError, Result},
    configs::validate_complexity,
};

/// PCM i16 → Opus bytes encoder for one listener.
/// Encodes 480-sample (10 ms) mono frames at 48 kHz.
pub struct OpusCodecEncoder {
    encoder: OpusEncoder,
    complexity: u8,
}

impl OpusCodecEncoder {
    /// Create a new encoder at 48 kHz mono with the AUDIO application profile.
    pub fn new() -> Result<Self> {
        let mut encoder = OpusEncoder::new(SampleRate::Hz48000, Channels::Mono, Application::Audio)
            .map_err(AudioError::codec)?;
        encoder
            .set_complexity(DEFAULT_OPUS_COMPLEXITY)
            .map_err(AudioError::codec)?;
        Ok(Self {
            encoder,
            complexity: DEFAULT_OPUS_COMPLEXITY,
        })
    }

    /// Encode exactly one frame into `out`. Returns the number of bytes written.
    pub fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        if pcm.len() != FRAME_SIZE {
            return Err(AudioError::Codec(format!(
                "expected a {FRAME_SIZE}-sample frame, got {}",
                pcm.len()
            )));
        }
        self.encoder.encode(pcm, out).map_err(AudioError::codec)
    }

    /// Clear the carried-over prediction history.
    pub fn reset(&mut self) -> Result<()> {
        self.encoder.reset_state().map_err(AudioError::codec)
    }

    pub fn set_complexity(&mut self, complexity: u8) -> Result<()> {
        validate_complexity(complexity)?;
        if complexity == self.complexity {
            return Ok(());
        }
        self.encoder
            .set_complexity(complexity)
            .map_err(AudioError::codec)?;
        self.complexity = complexity;
        Ok(())
    }

    pub fn complexity(&self) -> u8 {
        self.complexity
    }
}
