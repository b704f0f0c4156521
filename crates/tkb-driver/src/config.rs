//! Board configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! [can]
//! status_id = 0x110
//! command_filter_id = 0x100
//! command_filter_mask = 0x7F0
//!
//! [pwm]
//! clock_hz = 16000000
//! period_us = 2000
//!
//! [hall]
//! activation_level = "active_low"
//! debounce_samples = 3
//!
//! [timing]
//! watchdog_timeout_ms = 2000
//! ```

use crate::error::ConfigError;
use crate::hall::ActivationLevel;
use crate::kill::KillTiming;
use crate::thrust::{EscTiming, ThrustMapper};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tkb_protocol::{
    AcceptanceFilter, COMMAND_GROUP_ID, COMMAND_GROUP_MASK, ID_KILL_COMMAND, ID_THRUST_COMMAND,
    ID_TKB_STATUS, MAX_STANDARD_ID,
};

/// PWM module clock after the divider.
pub const DEFAULT_PWM_CLOCK_HZ: u32 = 16_000_000;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub can: CanConfig,
    pub pwm: PwmConfig,
    pub hall: HallConfig,
    pub timing: TimingConfig,
    pub events: EventConfig,
}

impl BoardConfig {
    /// Parse and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BoardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.can.validate()?;
        self.pwm
            .esc_timing()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("pwm: {}", e)))?;
        if self.pwm.clock_hz == 0 {
            return Err(ConfigError::Invalid("pwm.clock_hz must be > 0".to_string()));
        }
        self.timing.validate()?;
        if self.events.capacity == 0 {
            return Err(ConfigError::Invalid("events.capacity must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn thrust_mapper(&self) -> ThrustMapper {
        ThrustMapper::new(self.pwm.esc_timing(), self.pwm.clock_hz)
    }

    pub fn kill_timing(&self) -> KillTiming {
        KillTiming {
            hard_kill_delay: self.timing.hard_kill_delay(),
            esc_power_up_delay: self.timing.esc_power_up_delay(),
        }
    }
}

/// CAN identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanConfig {
    /// Identifier of every status frame the board sends
    pub status_id: u16,
    pub command_filter_id: u32,
    pub command_filter_mask: u32,
    /// Used by the bench tooling when sending kill commands
    pub kill_command_id: u16,
    /// Used by the bench tooling when sending thrust commands
    pub thrust_command_id: u16,
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            status_id: ID_TKB_STATUS,
            command_filter_id: COMMAND_GROUP_ID,
            command_filter_mask: COMMAND_GROUP_MASK,
            kill_command_id: ID_KILL_COMMAND,
            thrust_command_id: ID_THRUST_COMMAND,
        }
    }
}

impl CanConfig {
    pub fn command_filter(&self) -> AcceptanceFilter {
        AcceptanceFilter::new(self.command_filter_id, self.command_filter_mask)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, id) in [
            ("status_id", self.status_id as u32),
            ("kill_command_id", self.kill_command_id as u32),
            ("thrust_command_id", self.thrust_command_id as u32),
            ("command_filter_id", self.command_filter_id),
        ] {
            if id > MAX_STANDARD_ID {
                return Err(ConfigError::Invalid(format!(
                    "can.{} 0x{:X} is not an 11-bit identifier",
                    name, id
                )));
            }
        }
        let filter = self.command_filter();
        if filter.matches(self.status_id as u32) {
            return Err(ConfigError::Invalid(format!(
                "can.status_id 0x{:03X} falls inside the command filter",
                self.status_id
            )));
        }
        Ok(())
    }
}

/// PWM clock and ESC pulse timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub clock_hz: u32,
    pub period_us: u32,
    pub reverse_us: u32,
    pub neutral_us: u32,
    pub forward_us: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        let timing = EscTiming::default();
        Self {
            clock_hz: DEFAULT_PWM_CLOCK_HZ,
            period_us: timing.period_us,
            reverse_us: timing.reverse_us,
            neutral_us: timing.neutral_us,
            forward_us: timing.forward_us,
        }
    }
}

impl PwmConfig {
    pub fn esc_timing(&self) -> EscTiming {
        EscTiming {
            period_us: self.period_us,
            reverse_us: self.reverse_us,
            neutral_us: self.neutral_us,
            forward_us: self.forward_us,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HallConfig {
    pub activation_level: ActivationLevel,
    /// Consecutive identical samples before a level change is accepted
    pub debounce_samples: u8,
}

impl Default for HallConfig {
    fn default() -> Self {
        Self {
            activation_level: ActivationLevel::default(),
            debounce_samples: 3,
        }
    }
}

/// Tick periods and kill sequence delays, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub watchdog_period_ms: u64,
    pub watchdog_timeout_ms: u64,
    pub status_period_ms: u64,
    pub hard_kill_delay_ms: u64,
    pub esc_power_up_delay_ms: u64,
    /// Board loop wait when idle
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            watchdog_period_ms: 1000,
            watchdog_timeout_ms: 2000,
            status_period_ms: 500,
            hard_kill_delay_ms: 5000,
            esc_power_up_delay_ms: 2000,
            poll_interval_ms: 5,
        }
    }
}

impl TimingConfig {
    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn status_period(&self) -> Duration {
        Duration::from_millis(self.status_period_ms)
    }

    pub fn hard_kill_delay(&self) -> Duration {
        Duration::from_millis(self.hard_kill_delay_ms)
    }

    pub fn esc_power_up_delay(&self) -> Duration {
        Duration::from_millis(self.esc_power_up_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog_period_ms == 0 || self.status_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing: tick periods must be > 0".to_string(),
            ));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.watchdog_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Pending non-safety events before new ones are dropped
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}
