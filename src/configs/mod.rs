pub mod audio;
pub mod base;
pub mod logging;

pub use audio::*;
pub use base::*;
pub use logging::*;
