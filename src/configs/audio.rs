use serde::{Deserialize, Serialize};

use crate::{
    audio::constants::{
        DEFAULT_OPUS_COMPLEXITY, DEFAULT_QUEUE_CAPACITY, MAX_OPUS_COMPLEXITY,
    },
    common::errors::{AudioError, Result},
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AudioConfig {
    /// Opus encoder complexity, 0 (fastest) to 10 (best quality).
    #[serde(default = "default_opus_complexity")]
    pub opus_complexity: u8,
}

impl AudioConfig {
    /// Rejects out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<()> {
        validate_complexity(self.opus_complexity)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            opus_complexity: default_opus_complexity(),
        }
    }
}

pub fn validate_complexity(complexity: u8) -> Result<()> {
    if complexity > MAX_OPUS_COMPLEXITY {
        return Err(AudioError::invalid_argument(format!(
            "opus complexity must be between 0 and {MAX_OPUS_COMPLEXITY}, got {complexity}"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MainloopConfig {
    /// Handoff queue capacity; the oldest unit is dropped beyond it.
    #[serde(default = "default_max_queued_packets")]
    pub max_queued_packets: usize,
    /// How long `shutdown` waits for an in-flight cycle before aborting it.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for MainloopConfig {
    fn default() -> Self {
        Self {
            max_queued_packets: default_max_queued_packets(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

fn default_opus_complexity() -> u8 {
    DEFAULT_OPUS_COMPLEXITY
}

fn default_max_queued_packets() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_timeout_ms() -> u64 {
    500
}
