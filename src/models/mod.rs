//! Data models

pub mod frame;
pub mod network;
pub mod sample;
pub mod scenario;

pub use frame::*;
pub use network::*;
pub use sample::*;
pub use scenario::*;
