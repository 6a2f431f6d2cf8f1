#![doc = "Common types shared across the pulse sampler workspace."]

pub mod config;
pub mod error;
pub mod state;
pub mod time;
pub mod timing;

pub use config::*;
pub use error::*;
pub use state::*;
pub use time::*;
pub use timing::*;
