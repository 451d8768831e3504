use crate::{
    audio::constants::MAX_LISTENERS,
    common::errors::{AudioError, Result},
};

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Converts any `Display`-able value into the project's boxed error type.
///
/// Works with error types that don't impl `std::error::Error`
/// (e.g. `audiopus::Error`).
#[inline]
pub fn map_boxed_err<E: std::fmt::Display>(e: E) -> AnyError {
    Box::new(std::io::Error::other(e.to_string()))
}

/// Positional listener identifier in `[0, MAX_LISTENERS)`.
///
/// Stable for the lifetime of a connection. Every per-listener array in the
/// crate is indexed by `Slot::index()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u8);

impl Slot {
    /// Validates `index` against `MAX_LISTENERS`.
    pub fn new(index: usize) -> Result<Self> {
        if index < MAX_LISTENERS {
            Ok(Self(index as u8))
        } else {
            Err(AudioError::invalid_argument(format!(
                "slot {index} is out of range (0..{MAX_LISTENERS})"
            )))
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit of this slot in a 64-bit slot mask.
    #[inline]
    pub fn bit(self) -> u64 {
        1u64 << self.0
    }

    /// Every slot, in ascending order.
    pub fn all() -> impl Iterator<Item = Slot> {
        (0..MAX_LISTENERS as u8).map(Slot)
    }
}

impl TryFrom<usize> for Slot {
    type Error = AudioError;

    fn try_from(index: usize) -> Result<Self> {
        Self::new(index)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
