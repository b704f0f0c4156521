//! Hall-effect safety interlock.
//!
//! Three magnetic switches: soft-kill, go (enable) and on/off. A magnet being
//! present reads as the logical `High` level regardless of the electrical
//! polarity, which is selected by [`ActivationLevel`].
//!
//! Soft-kill and go are consumed as levels. The on/off switch produces an edge:
//! [`HallSample::on_off_removed`] is set only on an accepted present → absent
//! transition. A raw level change is accepted after `debounce_samples`
//! consecutive identical samples.

use crate::hal::{Edge, HallPin, HallPins, Pull};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Electrical polarity of the hall sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationLevel {
    /// Magnet drives the pin high; pulled down, removal is a falling edge
    ActiveHigh,
    /// Magnet drives the pin low; pulled up, removal is a rising edge
    #[default]
    ActiveLow,
}

impl ActivationLevel {
    pub fn pull(self) -> Pull {
        match self {
            ActivationLevel::ActiveHigh => Pull::Down,
            ActivationLevel::ActiveLow => Pull::Up,
        }
    }

    /// Edge seen when a magnet is taken away.
    pub fn removal_edge(self) -> Edge {
        match self {
            ActivationLevel::ActiveHigh => Edge::Falling,
            ActivationLevel::ActiveLow => Edge::Rising,
        }
    }

    /// Logical level for a raw pin level.
    pub fn level(self, raw: bool) -> HallLevel {
        let present = match self {
            ActivationLevel::ActiveHigh => raw,
            ActivationLevel::ActiveLow => !raw,
        };
        HallLevel::from_present(present)
    }

    /// Raw pin level that represents `present`.
    pub fn raw_for(self, present: bool) -> bool {
        match self {
            ActivationLevel::ActiveHigh => present,
            ActivationLevel::ActiveLow => !present,
        }
    }
}

/// Logical sensor level. `High` = magnet present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HallLevel {
    High,
    #[default]
    Low,
}

impl HallLevel {
    pub fn from_present(present: bool) -> Self {
        if present { HallLevel::High } else { HallLevel::Low }
    }

    pub fn is_present(self) -> bool {
        self == HallLevel::High
    }
}

/// Debounced state of the three sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HallReading {
    pub soft_kill_magnet_present: bool,
    pub go_magnet_present: bool,
    pub on_off_magnet_present: bool,
}

impl HallReading {
    pub fn get(&self, pin: HallPin) -> bool {
        match pin {
            HallPin::SoftKill => self.soft_kill_magnet_present,
            HallPin::Go => self.go_magnet_present,
            HallPin::OnOff => self.on_off_magnet_present,
        }
    }

    /// A level-triggered soft-kill condition holds: the soft-kill magnet is in
    /// place or the go magnet is missing. A board in `Running` would be soft
    /// killed on the next sample.
    pub fn holds_soft_kill(&self) -> bool {
        self.soft_kill_magnet_present || !self.go_magnet_present
    }

    /// Go and on/off magnets present, soft-kill magnet absent: the condition
    /// for a soft unkill.
    pub fn permits_unkill(&self) -> bool {
        self.on_off_magnet_present && !self.holds_soft_kill()
    }
}

impl fmt::Display for HallReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |present: bool| if present { '+' } else { '-' };
        write!(
            f,
            "soft_kill{} go{} on_off{}",
            mark(self.soft_kill_magnet_present),
            mark(self.go_magnet_present),
            mark(self.on_off_magnet_present)
        )
    }
}

/// Result of one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HallSample {
    pub reading: HallReading,
    /// Accepted present → absent transition of the on/off magnet
    pub on_off_removed: bool,
    /// Go level changed in this pass
    pub go_changed: bool,
}

/// Previous accepted level plus the debounce counter for one pin.
#[derive(Debug, Clone, Copy, Default)]
struct Debounced {
    accepted: HallLevel,
    candidate: HallLevel,
    count: u8,
}

impl Debounced {
    fn primed(level: HallLevel) -> Self {
        Self {
            accepted: level,
            candidate: level,
            count: 0,
        }
    }

    /// Feed one raw sample; returns the previous level when a change is accepted.
    fn update(&mut self, level: HallLevel, threshold: u8) -> Option<HallLevel> {
        if level == self.accepted {
            self.candidate = level;
            self.count = 0;
            return None;
        }

        if level == self.candidate {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = level;
            self.count = 1;
        }

        if self.count >= threshold {
            let previous = self.accepted;
            self.accepted = level;
            self.count = 0;
            Some(previous)
        } else {
            None
        }
    }
}

pub struct HallInterlock {
    activation: ActivationLevel,
    debounce_samples: u8,
    soft_kill: Debounced,
    go: Debounced,
    on_off: Debounced,
}

impl HallInterlock {
    /// `debounce_samples` below 1 is treated as 1 (single-sample acceptance).
    pub fn new(activation: ActivationLevel, debounce_samples: u8) -> Self {
        Self {
            activation,
            debounce_samples: debounce_samples.max(1),
            soft_kill: Debounced::default(),
            go: Debounced::default(),
            on_off: Debounced::default(),
        }
    }

    pub fn activation(&self) -> ActivationLevel {
        self.activation
    }

    pub fn debounce_samples(&self) -> u8 {
        self.debounce_samples
    }

    /// Apply pull direction and removal edge to all three pins.
    pub fn configure_pins(&self, pins: &mut dyn HallPins) {
        for pin in HallPin::ALL {
            pins.configure(pin, self.activation.pull(), self.activation.removal_edge());
        }
    }

    /// Take the current levels as accepted without producing events.
    pub fn prime(&mut self, pins: &mut dyn HallPins) -> HallReading {
        self.soft_kill = Debounced::primed(self.activation.level(pins.read(HallPin::SoftKill)));
        self.go = Debounced::primed(self.activation.level(pins.read(HallPin::Go)));
        self.on_off = Debounced::primed(self.activation.level(pins.read(HallPin::OnOff)));
        self.reading()
    }

    pub fn sample(&mut self, pins: &mut dyn HallPins) -> HallSample {
        let threshold = self.debounce_samples;
        let activation = self.activation;

        let _ = self
            .soft_kill
            .update(activation.level(pins.read(HallPin::SoftKill)), threshold);
        let go_changed = self
            .go
            .update(activation.level(pins.read(HallPin::Go)), threshold)
            .is_some();
        let on_off_removed = matches!(
            self.on_off
                .update(activation.level(pins.read(HallPin::OnOff)), threshold),
            Some(HallLevel::High)
        );

        HallSample {
            reading: self.reading(),
            on_off_removed,
            go_changed,
        }
    }

    pub fn reading(&self) -> HallReading {
        HallReading {
            soft_kill_magnet_present: self.soft_kill.accepted.is_present(),
            go_magnet_present: self.go.accepted.is_present(),
            on_off_magnet_present: self.on_off.accepted.is_present(),
        }
    }
}
