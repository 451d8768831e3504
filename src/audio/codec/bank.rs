use crate::{
    audio::constants::MAX_LISTENERS,
    common::{
        errors::{AudioError, Result},
        types::Slot,
    },
    configs::validate_complexity,
};

use super::opus_encoder::OpusCodecEncoder;

/// One Opus encoder per listener slot, stored positionally.
///
/// Encoders are created on first configuration and recreated only when a
/// slot is found empty. Complexity changes are applied in place.
pub struct EncoderBank {
    encoders: [Option<OpusCodecEncoder>; MAX_LISTENERS],
}

impl EncoderBank {
    pub fn new() -> Self {
        Self {
            encoders: std::array::from_fn(|_| None),
        }
    }

    /// Create every absent encoder and apply `complexity` to all of them.
    pub fn configure(&mut self, complexity: u8) -> Result<()> {
        validate_complexity(complexity)?;
        for encoder in self.encoders.iter_mut() {
            if encoder.is_none() {
                *encoder = Some(OpusCodecEncoder::new()?);
            }
            if let Some(encoder) = encoder {
                encoder.set_complexity(complexity)?;
            }
        }
        Ok(())
    }

    /// The encoder for `slot`, created if absent and brought up to
    /// `complexity` if it drifted.
    pub fn encoder_mut(&mut self, slot: Slot, complexity: u8) -> Result<&mut OpusCodecEncoder> {
        let entry = &mut self.encoders[slot.index()];
        if entry.is_none() {
            *entry = Some(OpusCodecEncoder::new()?);
        }
        let encoder = entry
            .as_mut()
            .ok_or(AudioError::InvalidState("EncoderBank"))?;
        if encoder.complexity() != complexity {
            encoder.set_complexity(complexity)?;
        }
        Ok(encoder)
    }

    pub fn live_count(&self) -> usize {
        self.encoders.iter().filter(|e| e.is_some()).count()
    }

    pub fn complexity(&self, slot: Slot) -> Option<u8> {
        self.encoders[slot.index()].as_ref().map(|e| e.complexity())
    }

    /// Drop every encoder.
    pub fn clear(&mut self) {
        self.encoders.iter_mut().for_each(|e| *e = None);
    }
}

impl Default for EncoderBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_creates_every_encoder() {
        let mut bank = EncoderBank::new();
        assert_eq!(bank.live_count(), 0);
        bank.configure(5).unwrap();
        assert_eq!(bank.live_count(), MAX_LISTENERS);
        assert_eq!(bank.complexity(Slot::new(63).unwrap()), Some(5));
    }

    #[test]
    fn reconfigure_keeps_instances() {
        let mut bank = EncoderBank::new();
        bank.configure(10).unwrap();
        bank.configure(2).unwrap();
        assert_eq!(bank.live_count(), MAX_LISTENERS);
        assert!(Slot::all().all(|s| bank.complexity(s) == Some(2)));
    }

    #[test]
    fn invalid_complexity_creates_nothing() {
        let mut bank = EncoderBank::new();
        assert!(bank.configure(42).is_err());
        assert_eq!(bank.live_count(), 0);
    }

    #[test]
    fn encoder_is_recreated_when_absent() {
        let mut bank = EncoderBank::new();
        let slot = Slot::new(9).unwrap();
        bank.encoder_mut(slot, 7).unwrap();
        assert_eq!(bank.live_count(), 1);
        assert_eq!(bank.complexity(slot), Some(7));
        bank.clear();
        assert_eq!(bank.live_count(), 0);
    }
}
