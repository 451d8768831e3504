pub mod channel;
pub mod reset;
pub mod traits;

pub use channel::AudioChannel;
pub use reset::CodecReset;
pub use traits::VoiceChannel;
