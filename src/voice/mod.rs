pub mod handoff;
pub mod mainloop;
pub mod roster;
pub mod transport;

pub use handoff::HandoffQueue;
pub use mainloop::{MainloopState, Producer, VoiceMainloop};
pub use roster::{ListenerRoster, SlotRoster};
pub use transport::{VoicePacket, VoiceTransport};
