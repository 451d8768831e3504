//! Fully decoded, immutable 48 kHz mono buffers.

use std::{io::Cursor, sync::Arc, time::Duration};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::audio::constants::{FRAME_DURATION_MS, FRAME_SIZE, INT16_MAX_F, INT16_MIN_F};

use super::traits::AudioSource;

/// Pre-decoded PCM sliced into fixed `FRAME_SIZE` frames.
///
/// A trailing partial frame is truncated rather than padded.
#[derive(Clone)]
pub struct PcmSource {
    samples: Arc<[i16]>,
    frames: usize,
}

impl PcmSource {
    pub fn from_samples(mut samples: Vec<i16>) -> Self {
        let frames = samples.len() / FRAME_SIZE;
        samples.truncate(frames * FRAME_SIZE);
        Self {
            samples: samples.into(),
            frames,
        }
    }

    /// Normalised `[-1.0, 1.0]` float samples, scaled and clipped to i16.
    pub fn from_f32(samples: &[f32]) -> Self {
        let converted = samples
            .iter()
            .map(|&s| (s * INT16_MAX_F).clamp(INT16_MIN_F, INT16_MAX_F) as i16)
            .collect();
        Self::from_samples(converted)
    }

    /// Raw s16le bytes. A dangling odd byte is ignored.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut reader = Cursor::new(bytes);
        let mut samples = Vec::with_capacity(bytes.len() / 2);
        while let Ok(sample) = reader.read_i16::<LittleEndian>() {
            samples.push(sample);
        }
        Self::from_samples(samples)
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.frames as u64 * FRAME_DURATION_MS)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }
}

impl AudioSource for PcmSource {
    fn has_frame(&self, cursor: usize) -> bool {
        cursor < self.frames
    }

    fn get_frame(&self, cursor: usize) -> &[i16] {
        if cursor >= self.frames {
            return &[];
        }
        let start = cursor * FRAME_SIZE;
        &self.samples[start..start + FRAME_SIZE]
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.frames)
    }
}

impl std::fmt::Debug for PcmSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmSource")
            .field("frames", &self.frames)
            .finish()
    }
}
