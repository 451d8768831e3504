pub mod accumulate;
pub mod manager;

pub use accumulate::mix_frame;
pub use manager::AudioManager;
