//! Simulated peripherals.
//!
//! Host stand-ins for the PWM generators, hall pins, power rails and time
//! source. Clones share state, so a test can hand one clone to the board and
//! keep another to drive inputs or inspect outputs. Peripherals built with a
//! shared [`ActuationLog`] record every output change in order.

use crate::channel::{GENERATOR_COUNT, PwmGenerator, ThrusterChannel};
use crate::hal::{Clock, Delay, Edge, HallPin, HallPins, PowerRails, Pull, PulseWidth, PwmOutput};
use crate::hall::ActivationLevel;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tkb_protocol::ThrusterId;

/// One recorded output change.
#[derive(Debug, Clone, PartialEq)]
pub enum Actuation {
    Pulse(PulseWidth),
    PulseBatch(Vec<PulseWidth>),
    OutputEnabled(bool),
    MainPower(bool),
    ThrusterPower(bool),
    Delay(Duration),
}

/// Ordered record of actuations shared between simulated peripherals.
#[derive(Debug, Clone, Default)]
pub struct ActuationLog(Arc<Mutex<Vec<Actuation>>>);

impl ActuationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, actuation: Actuation) {
        self.0.lock().push(actuation);
    }

    pub fn entries(&self) -> Vec<Actuation> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[derive(Debug, Default)]
struct PwmState {
    widths: [Option<u32>; ThrusterId::COUNT],
    enabled: bool,
    batches: usize,
    periods: [Option<u32>; GENERATOR_COUNT],
}

#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    state: Arc<Mutex<PwmState>>,
    log: ActuationLog,
}

impl SimPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: ActuationLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    /// Last width written to a thruster, `None` if never written.
    pub fn width(&self, id: ThrusterId) -> Option<u32> {
        self.state.lock().widths[id.index()]
    }

    pub fn widths(&self) -> [Option<u32>; ThrusterId::COUNT] {
        self.state.lock().widths
    }

    pub fn output_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Number of batched writes.
    pub fn batch_count(&self) -> usize {
        self.state.lock().batches
    }

    /// Report a generator period different from the configured clock.
    pub fn set_period_ticks(&self, generator: PwmGenerator, ticks: u32) {
        self.state.lock().periods[generator.index()] = Some(ticks);
    }
}

impl PwmOutput for SimPwm {
    fn set_pulse_width(&mut self, channel: ThrusterChannel, ticks: u32) {
        self.state.lock().widths[channel.id.index()] = Some(ticks);
        self.log.push(Actuation::Pulse(PulseWidth { channel, ticks }));
    }

    fn set_pulse_widths(&mut self, batch: &[PulseWidth]) {
        {
            let mut state = self.state.lock();
            for pulse in batch {
                state.widths[pulse.channel.id.index()] = Some(pulse.ticks);
            }
            state.batches += 1;
        }
        self.log.push(Actuation::PulseBatch(batch.to_vec()));
    }

    fn set_output_enabled(&mut self, enabled: bool) {
        self.state.lock().enabled = enabled;
        self.log.push(Actuation::OutputEnabled(enabled));
    }

    fn period_ticks(&self, generator: PwmGenerator) -> Option<u32> {
        self.state.lock().periods[generator.index()]
    }
}

#[derive(Debug)]
struct HallPinState {
    activation: ActivationLevel,
    magnets: [bool; 3],
    configuration: [Option<(Pull, Edge)>; 3],
}

fn pin_index(pin: HallPin) -> usize {
    match pin {
        HallPin::SoftKill => 0,
        HallPin::Go => 1,
        HallPin::OnOff => 2,
    }
}

/// Hall pins driven by magnet presence; raw levels follow the activation level.
#[derive(Debug, Clone)]
pub struct SimHallPins {
    state: Arc<Mutex<HallPinState>>,
}

impl SimHallPins {
    /// All magnets absent.
    pub fn new(activation: ActivationLevel) -> Self {
        Self {
            state: Arc::new(Mutex::new(HallPinState {
                activation,
                magnets: [false; 3],
                configuration: [None; 3],
            })),
        }
    }

    pub fn set_magnet(&self, pin: HallPin, present: bool) {
        self.state.lock().magnets[pin_index(pin)] = present;
    }

    pub fn magnet(&self, pin: HallPin) -> bool {
        self.state.lock().magnets[pin_index(pin)]
    }

    /// Pull and edge last applied through [`HallPins::configure`].
    pub fn configuration(&self, pin: HallPin) -> Option<(Pull, Edge)> {
        self.state.lock().configuration[pin_index(pin)]
    }
}

impl HallPins for SimHallPins {
    fn read(&mut self, pin: HallPin) -> bool {
        let state = self.state.lock();
        state.activation.raw_for(state.magnets[pin_index(pin)])
    }

    fn configure(&mut self, pin: HallPin, pull: Pull, edge: Edge) {
        self.state.lock().configuration[pin_index(pin)] = Some((pull, edge));
    }
}

#[derive(Debug, Default)]
struct RailState {
    main: bool,
    thrusters: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimPowerRails {
    state: Arc<Mutex<RailState>>,
    log: ActuationLog,
}

impl SimPowerRails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: ActuationLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    pub fn main_power(&self) -> bool {
        self.state.lock().main
    }

    pub fn thruster_power(&self) -> bool {
        self.state.lock().thrusters
    }
}

impl PowerRails for SimPowerRails {
    fn set_main_power(&mut self, on: bool) {
        self.state.lock().main = on;
        self.log.push(Actuation::MainPower(on));
    }

    fn set_thruster_power(&mut self, on: bool) {
        self.state.lock().thrusters = on;
        self.log.push(Actuation::ThrusterPower(on));
    }
}

/// Clock advanced by hand (or by its [`ManualDelay`]).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
    log: Option<ActuationLog>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record delays taken through [`ManualClock::delay`] in `log`.
    pub fn with_log(mut self, log: ActuationLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn advance(&self, duration: Duration) {
        self.micros
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now: Duration) {
        self.micros.store(now.as_micros() as u64, Ordering::SeqCst);
    }

    /// Delay that advances this clock instead of sleeping.
    pub fn delay(&self) -> ManualDelay {
        ManualDelay {
            clock: self.clone(),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
pub struct ManualDelay {
    clock: ManualClock,
}

impl Delay for ManualDelay {
    fn delay(&mut self, duration: Duration) {
        if let Some(log) = &self.clock.log {
            log.push(Actuation::Delay(duration));
        }
        self.clock.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::THRUSTER_CHANNELS;

    #[test]
    fn test_sim_pwm_clones_share_state() {
        let pwm = SimPwm::new();
        let mut board_side = pwm.clone();
        board_side.set_pulse_width(THRUSTER_CHANNELS[0], 24_000);
        board_side.set_output_enabled(true);
        assert_eq!(pwm.width(ThrusterId::FrontHorizontalLeft), Some(24_000));
        assert!(pwm.output_enabled());
        assert_eq!(pwm.batch_count(), 0);
    }

    #[test]
    fn test_hall_pins_follow_activation_level() {
        let pins = SimHallPins::new(ActivationLevel::ActiveLow);
        let mut input = pins.clone();
        // absent magnet on an active-low pin reads high
        assert!(input.read(HallPin::Go));
        pins.set_magnet(HallPin::Go, true);
        assert!(!input.read(HallPin::Go));
        assert!(pins.magnet(HallPin::Go));
    }

    #[test]
    fn test_manual_delay_advances_clock_and_logs() {
        let log = ActuationLog::new();
        let clock = ManualClock::new().with_log(log.clone());
        clock.delay().delay(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(250));
        assert_eq!(log.entries(), vec![Actuation::Delay(Duration::from_millis(250))]);
        clock.set(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_power_rails_log_order() {
        let log = ActuationLog::new();
        let rails = SimPowerRails::with_log(log.clone());
        let mut out = rails.clone();
        out.set_main_power(true);
        out.set_thruster_power(true);
        assert!(rails.main_power() && rails.thruster_power());
        assert_eq!(
            log.entries(),
            vec![Actuation::MainPower(true), Actuation::ThrusterPower(true)]
        );
    }
}
