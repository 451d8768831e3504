//! Central constants for the voice pipeline.
//!
//! All magic numbers in `src/audio/**` and `src/voice/**` live here so they
//! can be tuned in one place and remain consistent across modules.

// ── Sample / PCM ─────────────────────────────────────────────────────────────

/// Output sample rate (Hz).
pub const SAMPLE_RATE: u32 = 48_000;

/// Frame duration in milliseconds.
pub const FRAME_DURATION_MS: u64 = 10;

/// Samples per 10 ms mono frame at 48 kHz.
pub const FRAME_SIZE: usize = (SAMPLE_RATE as usize / 1_000) * FRAME_DURATION_MS as usize;

// ── Listeners ────────────────────────────────────────────────────────────────

/// Number of listener slots. Slot masks are `u64`, so this must not exceed 64.
pub const MAX_LISTENERS: usize = 64;

const _: () = assert!(MAX_LISTENERS <= u64::BITS as usize);

/// Mask with every listener slot set.
pub const ALL_SLOTS_MASK: u64 = if MAX_LISTENERS == 64 {
    u64::MAX
} else {
    (1u64 << MAX_LISTENERS) - 1
};

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Upper bound of the Opus complexity setting.
pub const MAX_OPUS_COMPLEXITY: u8 = 10;

/// Complexity used when nothing is configured.
pub const DEFAULT_OPUS_COMPLEXITY: u8 = 10;

/// Largest single encoded Opus packet we accept from the encoder.
pub const OPUS_BUFFER_SIZE: usize = 1_024;

// ── Mainloop ─────────────────────────────────────────────────────────────────

/// Sub-ticks (frames) produced per dispatch cycle.
pub const SUB_TICKS_PER_CYCLE: usize = 3;

/// Dispatch cycle period: an integer multiple of the frame duration.
pub const PACKET_INTERVAL_MS: u64 = SUB_TICKS_PER_CYCLE as u64 * FRAME_DURATION_MS;

/// Per-listener accumulation buffer for one cycle of encoded packets.
pub const MAINLOOP_BUFFER_SIZE: usize = 2_048;

/// Default handoff queue capacity (a few cycles' worth of full fan-out).
pub const DEFAULT_QUEUE_CAPACITY: usize = MAX_LISTENERS * 4;

// ── i16 PCM clip boundaries ──────────────────────────────────────────────────

pub const INT16_MAX_F: f32 = 32_767.0;
pub const INT16_MIN_F: f32 = -32_768.0;
