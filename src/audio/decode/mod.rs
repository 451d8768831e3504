//! Turns encoded audio (bytes, a file or a URL) into 48 kHz mono i16 PCM.
//!
//! Every call probes and decodes with its own symphonia state, so decodes may
//! run concurrently. The `_async` variants push the CPU work onto tokio's
//! blocking pool.

pub mod probe;

use std::{
    io::{Cursor, ErrorKind},
    path::{Path, PathBuf},
};

use symphonia::core::{audio::SampleBuffer, errors::Error, io::MediaSource};
use tracing::{debug, warn};

pub use probe::{OpenedTrack, open_track};

use crate::{
    audio::{
        constants::{INT16_MAX_F, INT16_MIN_F, SAMPLE_RATE},
        resample::resample_mono,
    },
    common::errors::{AudioError, Result},
};

#[derive(Debug, Clone, Copy)]
pub struct PcmDecoder {
    target_rate: u32,
}

impl Default for PcmDecoder {
    fn default() -> Self {
        Self {
            target_rate: SAMPLE_RATE,
        }
    }
}

impl PcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an in-memory file. Empty input yields no samples.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<i16>> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        self.decode_source(Box::new(Cursor::new(bytes.to_vec())), None)
    }

    pub fn decode_file(&self, path: impl AsRef<Path>) -> Result<Vec<i16>> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| AudioError::decode(format!("{}: {e}", path.display())))?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.decode_source(Box::new(file), extension)
    }

    /// Fetches `url` with a blocking client and decodes the body.
    ///
    /// Must not be called from inside an async context; use
    /// [`decode_url_async`](Self::decode_url_async) there.
    pub fn decode_url(&self, url: &str) -> Result<Vec<i16>> {
        let body = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(AudioError::decode)?;
        debug!(url, bytes = body.len(), "Fetched audio");
        self.decode(&body)
    }

    pub async fn decode_async(&self, bytes: Vec<u8>) -> Result<Vec<i16>> {
        let decoder = *self;
        tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(AudioError::decode)?
    }

    pub async fn decode_file_async(&self, path: impl Into<PathBuf>) -> Result<Vec<i16>> {
        let decoder = *self;
        let path = path.into();
        tokio::task::spawn_blocking(move || decoder.decode_file(&path))
            .await
            .map_err(AudioError::decode)?
    }

    pub async fn decode_url_async(&self, url: &str) -> Result<Vec<i16>> {
        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AudioError::decode)?;
        let body = response.bytes().await.map_err(AudioError::decode)?;
        debug!(url, bytes = body.len(), "Fetched audio");
        self.decode_async(body.to_vec()).await
    }

    fn decode_source(
        &self,
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
    ) -> Result<Vec<i16>> {
        let OpenedTrack {
            mut format,
            mut decoder,
            track_id,
            mut sample_rate,
        } = open_track(source, extension)?;

        let mut mono: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(Error::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(Error::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(Error::DecodeError(e)) => {
                    warn!("Decode error (recoverable): {e}");
                    continue;
                }
                Err(Error::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if channels == 0 {
                continue;
            }
            sample_rate = spec.rate;

            if sample_buf
                .as_ref()
                .is_none_or(|b| b.capacity() < decoded.capacity() * channels)
            {
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            downmix_into(buf.samples(), channels, &mut mono);
        }

        let pcm: Vec<i16> = mono.iter().map(|&s| to_i16(s)).collect();
        debug!(
            samples = pcm.len(),
            source_rate = sample_rate,
            "Decoded audio"
        );
        Ok(resample_mono(&pcm, sample_rate, self.target_rate))
    }
}

/// Averages interleaved frames down to one channel.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.reserve(interleaved.len() / channels);
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample * INT16_MAX_F).round().clamp(INT16_MIN_F, INT16_MAX_F) as i16
}
