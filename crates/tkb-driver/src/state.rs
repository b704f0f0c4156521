//! Published board status.
//!
//! The board loop builds a fresh [`BoardStatus`] after every processing cycle
//! and swaps it into an `ArcSwap`. Readers on other threads get a consistent
//! copy without locking and never hold a live reference to the kill state.

use crate::hall::HallReading;
use crate::kill::KillState;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tkb_protocol::StatusEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardStatus {
    pub state: KillState,
    /// Debounced interlock levels
    pub hall: HallReading,
    /// Kill status last reported on the bus
    pub last_status: StatusEvent,
    /// Trailer bytes of the last thrust frame
    pub last_cr: Option<u8>,
    pub last_hs: Option<u8>,
    pub last_ua: Option<u8>,
    /// `None` until a command was accepted
    pub last_command_age: Option<Duration>,
    pub uptime: Duration,
    /// Completed processing cycles
    pub cycles: u64,
}

impl Default for BoardStatus {
    fn default() -> Self {
        Self {
            state: KillState::HardKilled,
            hall: HallReading::default(),
            last_status: StatusEvent::HardKilled,
            last_cr: None,
            last_hs: None,
            last_ua: None,
            last_command_age: None,
            uptime: Duration::ZERO,
            cycles: 0,
        }
    }
}

/// Cloneable read side of the published status.
#[derive(Debug, Clone)]
pub struct StatusReader {
    inner: Arc<ArcSwap<BoardStatus>>,
}

impl StatusReader {
    pub(crate) fn new(inner: Arc<ArcSwap<BoardStatus>>) -> Self {
        Self { inner }
    }

    pub fn load(&self) -> BoardStatus {
        **self.inner.load()
    }

    pub fn state(&self) -> KillState {
        self.inner.load().state
    }
}
