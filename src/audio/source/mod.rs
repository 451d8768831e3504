pub mod frame;
pub mod pcm;
pub mod traits;

pub use frame::Frame;
pub use pcm::PcmSource;
pub use traits::AudioSource;
