use crate::{audio::constants::ALL_SLOTS_MASK, common::types::Slot};

/// Tagged outcome of a state change that invalidates codec history.
///
/// Returned by the channel operation that caused it and applied by the
/// [`AudioManager`](crate::audio::AudioManager). Exactly one value is
/// produced per source swap or cursor reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a codec reset must be applied to the AudioManager"]
pub enum CodecReset {
    /// Only this listener's encoder.
    Slot(Slot),
    /// Every listener's encoder.
    All,
}

impl CodecReset {
    /// Slot mask addressed by this reset.
    pub fn mask(self) -> u64 {
        match self {
            Self::Slot(slot) => slot.bit(),
            Self::All => ALL_SLOTS_MASK,
        }
    }
}
