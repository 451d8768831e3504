//! Mono PCM resampling into the pipeline rate.
//!
//! [`HermiteResampler`] is streaming: feed blocks through `process`, then
//! call `flush` once after the last block to emit the samples still held
//! back.

pub mod hermite;

pub use hermite::HermiteResampler;

/// Resamples a whole mono buffer with the Hermite resampler.
pub fn resample_mono(input: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || input.is_empty() {
        return input.to_vec();
    }

    let expected = (input.len() as u64 * target_rate as u64 / source_rate as u64) as usize;
    let mut output = Vec::with_capacity(expected + 4);
    let mut resampler = HermiteResampler::new(source_rate, target_rate);
    resampler.process(input, &mut output);
    resampler.flush(&mut output);
    output
}
