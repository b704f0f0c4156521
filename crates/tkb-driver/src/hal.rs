//! Hardware seams.
//!
//! Peripheral bring-up stays outside this crate. The board core only talks to
//! these traits: PWM generators, the three hall pins, the two power rails, a
//! monotonic clock and a blocking delay. Host implementations of the clock and
//! delay live here; simulated peripherals are in [`crate::sim`].

use crate::channel::{PwmGenerator, ThrusterChannel};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// One entry of a pulse-width batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseWidth {
    pub channel: ThrusterChannel,
    pub ticks: u32,
}

/// PWM peripheral driving the eight ESC channels.
pub trait PwmOutput {
    /// Set one channel's pulse width, in ticks of its generator.
    fn set_pulse_width(&mut self, channel: ThrusterChannel, ticks: u32);

    /// Apply several widths as one batch.
    fn set_pulse_widths(&mut self, batch: &[PulseWidth]) {
        for pulse in batch {
            self.set_pulse_width(pulse.channel, pulse.ticks);
        }
    }

    /// Gate all eight outputs.
    fn set_output_enabled(&mut self, enabled: bool);

    /// Generator period in ticks, when the peripheral can report it.
    fn period_ticks(&self, _generator: PwmGenerator) -> Option<u32> {
        None
    }
}

/// The three hall-effect inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HallPin {
    /// Soft-kill sensor
    SoftKill,
    /// Go/enable sensor (`HALL_KILL_ENABLE` on the schematic)
    Go,
    /// On/off sensor (`HALL_HARDKILL` on the schematic)
    OnOff,
}

impl HallPin {
    pub const ALL: [HallPin; 3] = [HallPin::SoftKill, HallPin::Go, HallPin::OnOff];
}

/// Input pull resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
}

/// Interrupt edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Raw digital inputs for the hall sensors.
pub trait HallPins {
    /// Raw pin level (`true` = electrically high).
    fn read(&mut self, pin: HallPin) -> bool;

    /// Configure the pull resistor and the interrupt edge of a pin.
    fn configure(&mut self, _pin: HallPin, _pull: Pull, _edge: Edge) {}
}

/// Main and thruster power switching.
pub trait PowerRails {
    fn set_main_power(&mut self, on: bool);
    fn set_thruster_power(&mut self, on: bool);
}

/// Monotonic time since boot.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Blocking delay used by the kill/unkill sequences.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Host clock: monotonic time anchored at first use.
///
/// Unaffected by wall-clock changes. Every `SystemClock` shares the same anchor,
/// so readings from different instances are comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

static BOOT: OnceLock<Instant> = OnceLock::new();

impl SystemClock {
    pub fn new() -> Self {
        BOOT.get_or_init(Instant::now);
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        BOOT.get_or_init(Instant::now).elapsed()
    }
}

/// Host delay backed by `spin_sleep` for sub-millisecond accuracy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            spin_sleep::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = clock.now();
        assert!(t2 > t1, "monotonic time should increase");
        assert!(t2 - t1 >= Duration::from_millis(5));
    }

    #[test]
    fn test_system_clocks_share_anchor() {
        let a = SystemClock::new();
        let b = SystemClock;
        let ta = a.now();
        let tb = b.now();
        assert!(tb >= ta);
    }

    #[test]
    fn test_spin_delay_waits() {
        let start = Instant::now();
        SpinDelay.delay(Duration::from_millis(3));
        assert!(start.elapsed() >= Duration::from_millis(3));
        SpinDelay.delay(Duration::ZERO);
    }

    struct CountingPwm {
        singles: usize,
        enabled: bool,
    }

    impl PwmOutput for CountingPwm {
        fn set_pulse_width(&mut self, _channel: ThrusterChannel, _ticks: u32) {
            self.singles += 1;
        }

        fn set_output_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }
    }

    #[test]
    fn test_default_batch_falls_back_to_single_writes() {
        let mut pwm = CountingPwm {
            singles: 0,
            enabled: false,
        };
        let batch: Vec<PulseWidth> = crate::channel::THRUSTER_CHANNELS
            .iter()
            .map(|&channel| PulseWidth { channel, ticks: 1 })
            .collect();
        pwm.set_pulse_widths(&batch);
        assert_eq!(pwm.singles, 8);
        assert_eq!(pwm.period_ticks(PwmGenerator::Gen0), None);
        pwm.set_output_enabled(true);
        assert!(pwm.enabled);
    }
}
