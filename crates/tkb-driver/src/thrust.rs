//! Thrust mapping: normalized speed → ESC pulse width in generator ticks.
//!
//! The ESC protocol is a 2000 µs period with 1100 µs full reverse, 1500 µs
//! neutral and 1900 µs full forward by default. Widths are linear between those
//! points and expressed in ticks of the channel's generator period.

use crate::channel::{GENERATOR_COUNT, PwmGenerator, THRUSTER_CHANNELS, ThrusterChannel};
use crate::hal::{PulseWidth, PwmOutput};
use tkb_protocol::{ThrustCommand, ThrusterId};

/// ESC pulse timing, all in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscTiming {
    pub period_us: u32,
    pub reverse_us: u32,
    pub neutral_us: u32,
    pub forward_us: u32,
}

impl Default for EscTiming {
    fn default() -> Self {
        Self {
            period_us: 2000,
            reverse_us: 1100,
            neutral_us: 1500,
            forward_us: 1900,
        }
    }
}

impl EscTiming {
    /// `0 < reverse < neutral < forward <= period`
    pub fn validate(&self) -> Result<(), String> {
        if self.period_us == 0 {
            return Err("period_us must be > 0".to_string());
        }
        if !(self.reverse_us < self.neutral_us && self.neutral_us < self.forward_us) {
            return Err(format!(
                "expected reverse_us < neutral_us < forward_us, got {} / {} / {}",
                self.reverse_us, self.neutral_us, self.forward_us
            ));
        }
        if self.reverse_us == 0 || self.forward_us > self.period_us {
            return Err(format!(
                "pulse widths must lie in (0, period_us = {}]",
                self.period_us
            ));
        }
        Ok(())
    }
}

/// Generator period in ticks for a PWM clock.
pub fn period_ticks_for(clock_hz: u32, period_us: u32) -> u32 {
    (clock_hz as u64 * period_us as u64 / 1_000_000) as u32
}

/// Pure speed → ticks mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrustMapper {
    timing: EscTiming,
    period_ticks: [u32; GENERATOR_COUNT],
}

impl ThrustMapper {
    /// All four generators clocked from `clock_hz`.
    pub fn new(timing: EscTiming, clock_hz: u32) -> Self {
        let ticks = period_ticks_for(clock_hz, timing.period_us);
        Self {
            timing,
            period_ticks: [ticks; GENERATOR_COUNT],
        }
    }

    /// Override one generator's period (e.g. as read back from the peripheral).
    pub fn with_generator_period(mut self, generator: PwmGenerator, ticks: u32) -> Self {
        self.period_ticks[generator.index()] = ticks;
        self
    }

    pub fn timing(&self) -> &EscTiming {
        &self.timing
    }

    pub fn period_ticks(&self, generator: PwmGenerator) -> u32 {
        self.period_ticks[generator.index()]
    }

    fn us_to_ticks(&self, us: u32, generator: PwmGenerator) -> u32 {
        let period_us = self.timing.period_us.max(1) as u64;
        (us as u64 * self.period_ticks(generator) as u64 / period_us) as u32
    }

    pub fn neutral_ticks(&self, generator: PwmGenerator) -> u32 {
        self.us_to_ticks(self.timing.neutral_us, generator)
    }

    pub fn full_forward_ticks(&self, generator: PwmGenerator) -> u32 {
        self.us_to_ticks(self.timing.forward_us, generator)
    }

    pub fn full_reverse_ticks(&self, generator: PwmGenerator) -> u32 {
        self.us_to_ticks(self.timing.reverse_us, generator)
    }

    /// Pulse width for `speed` on `channel`. Speed is clamped to `[-1, 1]`,
    /// NaN maps to neutral. `0.0` (and `-0.0`) is exactly neutral.
    pub fn pulse_ticks(&self, speed: f32, channel: ThrusterChannel) -> u32 {
        let generator = channel.generator;
        let neutral = self.neutral_ticks(generator);
        let speed = if speed.is_nan() {
            0.0
        } else {
            speed.clamp(-1.0, 1.0)
        };

        if speed >= 0.0 {
            let span = self.full_forward_ticks(generator).saturating_sub(neutral);
            neutral + (speed * span as f32).round() as u32
        } else {
            let span = neutral.saturating_sub(self.full_reverse_ticks(generator));
            let offset = ((-speed) * span as f32).round() as u32;
            neutral - offset.min(span)
        }
    }

    pub fn pulse_for(&self, command: &ThrustCommand) -> PulseWidth {
        let channel = ThrusterChannel::of(command.channel);
        PulseWidth {
            channel,
            ticks: self.pulse_ticks(command.speed, channel),
        }
    }

    /// Neutral width for all eight channels.
    pub fn stop_all_batch(&self) -> [PulseWidth; ThrusterId::COUNT] {
        THRUSTER_CHANNELS.map(|channel| PulseWidth {
            channel,
            ticks: self.neutral_ticks(channel.generator),
        })
    }

    /// Apply neutral to all eight channels as one batch.
    pub fn stop_all(&self, pwm: &mut dyn PwmOutput) {
        pwm.set_pulse_widths(&self.stop_all_batch());
    }

    /// Map and apply one command, returning the width written.
    pub fn apply(&self, command: &ThrustCommand, pwm: &mut dyn PwmOutput) -> PulseWidth {
        let pulse = self.pulse_for(command);
        pwm.set_pulse_width(pulse.channel, pulse.ticks);
        pulse
    }
}

impl Default for ThrustMapper {
    fn default() -> Self {
        Self::new(EscTiming::default(), crate::config::DEFAULT_PWM_CLOCK_HZ)
    }
}
