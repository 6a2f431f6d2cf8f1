#![doc = "Fixed-rate multi-channel sampling runtime for pulse sensors."]

pub mod acquisition;
pub mod channel;
pub mod clock;
pub mod dispatch;
pub mod handoff;
pub mod sample_clock;
pub mod scheduler;
pub mod source;
pub mod trigger;

pub use channel::*;
pub use clock::*;
pub use dispatch::{Registration, TickTarget};
pub use handoff::*;
pub use sample_clock::*;
pub use scheduler::*;
pub use source::*;
pub use trigger::*;
