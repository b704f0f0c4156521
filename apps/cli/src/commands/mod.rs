//! Command definitions

pub mod config;
pub mod decode;
pub mod encode;
pub mod monitor;
pub mod pulse;
pub mod send;
pub mod simulate;

pub use config::ConfigCommand;
pub use decode::DecodeCommand;
pub use encode::EncodeCommand;
pub use monitor::MonitorCommand;
pub use pulse::PulseCommand;
pub use send::SendCommand;
pub use simulate::SimulateCommand;
