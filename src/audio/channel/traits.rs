use crate::{
    audio::source::Frame,
    common::{errors::Result, types::Slot},
};

use super::reset::CodecReset;

/// Capability contract for custom channels.
///
/// The [`AudioManager`](crate::audio::AudioManager) drives custom channels
/// the same way as its standard ones: per sub-tick it asks each channel for
/// a frame per listener, then calls [`advance`](VoiceChannel::advance)
/// exactly once. Errors from `has_frame` and `get_frame` fail that
/// listener's encode.
///
/// Implement it to feed live audio (a generator, a relayed stream...) into
/// the mix. Custom channels are always mixed at full volume.
pub trait VoiceChannel: Send + Sync {
    /// Unique identity of the channel.
    fn id(&self) -> &str;

    /// Whether `slot` should hear this channel in the current sub-tick.
    fn has_frame(&self, slot: Slot) -> Result<bool>;

    /// The current frame for `slot`. Only called after `has_frame` returned true.
    fn get_frame(&self, slot: Slot) -> Result<Frame>;

    /// Move to the next sub-tick.
    fn advance(&self) -> Result<()>;

    /// A pending codec reset raised by the channel itself, if any.
    ///
    /// Polled once per sub-tick; return each request only once.
    fn take_reset(&self) -> Option<CodecReset> {
        None
    }

    /// Release resources. Called when the channel leaves the manager.
    fn dispose(&self) {}
}
