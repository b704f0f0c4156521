//! Thruster channel wiring.
//!
//! Each thruster is driven by one PWM pin; pins are paired on four generators
//! (one generator per front/back × horizontal/vertical pair). The table is fixed
//! by the board layout.

use tkb_protocol::ThrusterId;
use std::fmt;

pub const GENERATOR_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PwmGenerator {
    Gen0,
    Gen1,
    Gen2,
    Gen3,
}

impl PwmGenerator {
    pub const ALL: [PwmGenerator; GENERATOR_COUNT] = [
        PwmGenerator::Gen0,
        PwmGenerator::Gen1,
        PwmGenerator::Gen2,
        PwmGenerator::Gen3,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PwmGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GEN{}", self.index())
    }
}

/// PWM output pin, `PWM0`..`PWM7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PwmPin(pub u8);

impl fmt::Display for PwmPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PWM{}", self.0)
    }
}

/// One of the eight thruster outputs. Immutable configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThrusterChannel {
    pub id: ThrusterId,
    pub generator: PwmGenerator,
    pub pin: PwmPin,
}

impl ThrusterChannel {
    const fn new(id: ThrusterId, generator: PwmGenerator, pin: u8) -> Self {
        Self {
            id,
            generator,
            pin: PwmPin(pin),
        }
    }

    /// Wiring for a thruster.
    pub fn of(id: ThrusterId) -> ThrusterChannel {
        THRUSTER_CHANNELS[id.index()]
    }
}

impl fmt::Display for ThrusterChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.id, self.generator, self.pin)
    }
}

/// Indexed by wire thruster index.
pub const THRUSTER_CHANNELS: [ThrusterChannel; ThrusterId::COUNT] = [
    ThrusterChannel::new(ThrusterId::FrontHorizontalLeft, PwmGenerator::Gen1, 3),
    ThrusterChannel::new(ThrusterId::FrontHorizontalRight, PwmGenerator::Gen1, 2),
    ThrusterChannel::new(ThrusterId::FrontVerticalLeft, PwmGenerator::Gen2, 4),
    ThrusterChannel::new(ThrusterId::FrontVerticalRight, PwmGenerator::Gen2, 5),
    ThrusterChannel::new(ThrusterId::BackHorizontalLeft, PwmGenerator::Gen0, 0),
    ThrusterChannel::new(ThrusterId::BackHorizontalRight, PwmGenerator::Gen0, 1),
    ThrusterChannel::new(ThrusterId::BackVerticalLeft, PwmGenerator::Gen3, 7),
    ThrusterChannel::new(ThrusterId::BackVerticalRight, PwmGenerator::Gen3, 6),
];
