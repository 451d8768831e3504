pub mod channel;
pub mod codec;
pub mod constants;
pub mod decode;
pub mod mix;
pub mod resample;
pub mod source;

pub use channel::{AudioChannel, CodecReset, VoiceChannel};
pub use codec::{EncoderBank, OpusCodecEncoder};
pub use decode::PcmDecoder;
pub use mix::AudioManager;
pub use source::{AudioSource, Frame, PcmSource};
