pub mod bank;
pub mod opus_encoder;

pub use bank::EncoderBank;
pub use opus_encoder::OpusCodecEncoder;
