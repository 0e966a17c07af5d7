//! Built-in node implementations.

pub mod channel;
pub mod ethernet;
pub mod gate;
pub mod triggers;

pub use channel::AcquisitionChannel;
pub use ethernet::EthernetDecoder;
pub use gate::{GateFilter, GateMode};
