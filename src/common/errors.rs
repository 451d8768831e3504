use thiserror::Error;

/// Errors raised by the mixing and dispatch core.
///
/// `InvalidState` and `InvalidArgument` are programmer errors and surface at
/// the call site. `Codec` failures inside the mainloop are caught per listener.
/// `Decode` failures always reach the caller of the decode operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("{0} is in an invalid state (disposed or not ready)")]
    InvalidState(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Codec failure: {0}")]
    Codec(String),

    #[error("Decode failure: {0}")]
    Decode(String),
}

impl AudioError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn codec<E: std::fmt::Display>(e: E) -> Self {
        Self::Codec(e.to_string())
    }

    pub fn decode<E: std::fmt::Display>(e: E) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Result alias used across the audio core.
pub type Result<T> = std::result::Result<T, AudioError>;
