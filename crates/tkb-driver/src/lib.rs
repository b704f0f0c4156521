//! # TKB Driver
//!
//! Safety and thrust-control core of the Thruster Kill Board:
//!
//! - `kill`: the kill state machine, sole owner of [`KillState`]
//! - `thrust`: normalized speed → ESC pulse width
//! - `hall`: debounced hall-effect interlock
//! - `watchdog`: command freshness check
//! - `events` / `timer` / `reader`: interrupt sources feeding one bounded queue
//! - `board`: the main loop tying them together
//! - `hal`: the peripheral seams; `sim` provides host stand-ins
//!
//! Status is observed from other threads through [`StatusReader`] snapshots
//! and [`BoardMetrics`] counters.

mod board;
pub mod channel;
pub mod config;
mod error;
pub mod events;
pub mod hal;
pub mod hall;
pub mod kill;
pub mod metrics;
pub mod reader;
pub mod sim;
pub mod state;
pub mod thrust;
pub mod timer;
pub mod watchdog;

pub use board::{Board, BoardBuilder};
pub use channel::{PwmGenerator, PwmPin, THRUSTER_CHANNELS, ThrusterChannel};
pub use config::{BoardConfig, CanConfig, EventConfig, HallConfig, PwmConfig, TimingConfig};
pub use error::{ConfigError, DriverError};
pub use events::{BoardEvent, EventQueue, InterruptHandle};
pub use hal::{Clock, Delay, HallPin, HallPins, PowerRails, PulseWidth, PwmOutput, SpinDelay, SystemClock};
pub use hall::{ActivationLevel, HallInterlock, HallLevel, HallReading};
pub use kill::{KillEvent, KillState, KillStateMachine, KillTiming, Transition};
pub use metrics::{BoardMetrics, MetricsSnapshot};
pub use reader::CanReader;
pub use state::{BoardStatus, StatusReader};
pub use thrust::{EscTiming, ThrustMapper};
pub use timer::{BoardTimers, PeriodicTimer};
pub use watchdog::{CommandWatchdog, WatchdogStatus};
