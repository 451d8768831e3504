//! Per-listener voice channel mixing and Opus dispatch.
//!
//! Audio is organised in named channels, each playing one shared source with
//! independent playback state for up to 64 listener slots. Every 30 ms the
//! [`voice::VoiceMainloop`] mixes what each listener should hear, encodes it
//! to Opus and queues one unit per listener for the host to send.

pub mod api;
pub mod audio;
pub mod common;
pub mod configs;
pub mod voice;

pub use api::{AudioApi, ChannelController};
pub use common::{AudioError, Result, Slot};
