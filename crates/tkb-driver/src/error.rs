//! Driver error types

use crate::kill::KillState;
use tkb_can::CanError;
use thiserror::Error;

/// Driver errors.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// A status transmit failed during a transition. The transition was still
    /// committed; `state` is the state the board is now in.
    #[error("Status transmit failed (state committed: {state}): {source}")]
    Transport {
        state: KillState,
        #[source]
        source: CanError,
    },

    /// Every `InterruptHandle` was dropped
    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DriverError {
    /// State committed before the error, for transport failures.
    pub fn committed_state(&self) -> Option<KillState> {
        match self {
            DriverError::Transport { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
