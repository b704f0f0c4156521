//! Board main loop.
//!
//! [`Board`] owns every piece of mutable board state: the kill state machine,
//! the hall interlock, the command watchdog and the peripherals. Interrupt
//! contexts only hold an [`InterruptHandle`]. One call to [`Board::poll`] (or
//! [`Board::poll_timeout`]) is one processing cycle:
//!
//! 1. drain the event queue in arrival order,
//! 2. sample the hall inputs,
//! 3. publish a fresh [`BoardStatus`].
//!
//! Per-event errors are logged and counted; nothing except a closed event
//! channel stops the loop.

use crate::channel::PwmGenerator;
use crate::config::BoardConfig;
use crate::error::DriverError;
use crate::events::{BoardEvent, EventQueue, InterruptHandle, event_queue};
use crate::hal::{Clock, Delay, HallPins, PowerRails, PwmOutput, SpinDelay, SystemClock};
use crate::hall::HallInterlock;
use crate::kill::{Actuators, KillEvent, KillState, KillStateMachine};
use crate::metrics::{BoardMetrics, MetricsSnapshot};
use crate::state::{BoardStatus, StatusReader};
use crate::watchdog::{CommandWatchdog, WatchdogStatus};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tkb_can::{CanError, TxAdapter};
use tkb_protocol::{AcceptanceFilter, Command, StatusEvent, TkbFrame, render_payload};
use tracing::{debug, info, trace, warn};

/// Counts every transmit attempt on the way to the real adapter.
struct MeteredTx<'a> {
    inner: &'a mut dyn TxAdapter,
    metrics: &'a BoardMetrics,
}

impl TxAdapter for MeteredTx<'_> {
    fn send(&mut self, frame: TkbFrame) -> Result<(), CanError> {
        BoardMetrics::incr(&self.metrics.tx_frames_total);
        let result = self.inner.send(frame);
        if result.is_err() {
            BoardMetrics::incr(&self.metrics.tx_failures);
        }
        result
    }
}

/// Builder for [`Board`].
///
/// CAN, PWM, hall pins and power rails are required. The clock and delay
/// default to the host implementations.
///
/// ```rust
/// use tkb_can::MockCanAdapter;
/// use tkb_driver::sim::{SimHallPins, SimPowerRails, SimPwm};
/// use tkb_driver::{ActivationLevel, BoardBuilder, BoardConfig, KillState};
///
/// let (board, _handle) = BoardBuilder::new()
///     .config(BoardConfig::default())
///     .can(MockCanAdapter::new())
///     .pwm(SimPwm::new())
///     .hall_pins(SimHallPins::new(ActivationLevel::ActiveLow))
///     .power_rails(SimPowerRails::new())
///     .build()
///     .unwrap();
/// assert_eq!(board.state(), KillState::HardKilled);
/// ```
pub struct BoardBuilder {
    config: BoardConfig,
    can: Option<Box<dyn TxAdapter + Send>>,
    pwm: Option<Box<dyn PwmOutput + Send>>,
    hall_pins: Option<Box<dyn HallPins + Send>>,
    power: Option<Box<dyn PowerRails + Send>>,
    clock: Box<dyn Clock + Send>,
    delay: Box<dyn Delay + Send>,
}

impl Default for BoardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardBuilder {
    pub fn new() -> Self {
        Self {
            config: BoardConfig::default(),
            can: None,
            pwm: None,
            hall_pins: None,
            power: None,
            clock: Box::new(SystemClock::new()),
            delay: Box::new(SpinDelay),
        }
    }

    pub fn config(mut self, config: BoardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn can<C: TxAdapter + Send + 'static>(mut self, can: C) -> Self {
        self.can = Some(Box::new(can));
        self
    }

    pub fn pwm<P: PwmOutput + Send + 'static>(mut self, pwm: P) -> Self {
        self.pwm = Some(Box::new(pwm));
        self
    }

    pub fn hall_pins<H: HallPins + Send + 'static>(mut self, pins: H) -> Self {
        self.hall_pins = Some(Box::new(pins));
        self
    }

    pub fn power_rails<R: PowerRails + Send + 'static>(mut self, power: R) -> Self {
        self.power = Some(Box::new(power));
        self
    }

    pub fn clock<C: Clock + Send + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn delay<D: Delay + Send + 'static>(mut self, delay: D) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Bring the board up in `HardKilled` with all outputs safe.
    ///
    /// Hall pins are configured and their current levels taken as accepted, so
    /// a magnet that is already absent at boot does not count as a removal. No
    /// status frame is sent until the first status tick.
    pub fn build(self) -> Result<(Board, InterruptHandle), DriverError> {
        let config = self.config;
        config.validate()?;

        let missing = |part: &str| DriverError::InvalidInput(format!("Board {} not set", part));
        let mut can = self.can.ok_or_else(|| missing("CAN adapter"))?;
        let mut pwm = self.pwm.ok_or_else(|| missing("PWM output"))?;
        let mut hall_pins = self.hall_pins.ok_or_else(|| missing("hall pins"))?;
        let mut power = self.power.ok_or_else(|| missing("power rails"))?;
        let clock = self.clock;
        let mut delay = self.delay;

        let mut mapper = config.thrust_mapper();
        for generator in PwmGenerator::ALL {
            if let Some(ticks) = pwm.period_ticks(generator) {
                debug!("{} period reported as {} ticks", generator, ticks);
                mapper = mapper.with_generator_period(generator, ticks);
            }
        }

        let mut interlock =
            HallInterlock::new(config.hall.activation_level, config.hall.debounce_samples);
        interlock.configure_pins(&mut *hall_pins);
        let hall = interlock.prime(&mut *hall_pins);

        let mut machine = KillStateMachine::new(mapper, config.can.status_id, config.kill_timing());
        machine.enter_safe_state(&mut Actuators {
            can: &mut *can,
            pwm: &mut *pwm,
            power: &mut *power,
            delay: &mut *delay,
        });

        let metrics = Arc::new(BoardMetrics::new());
        let (handle, queue) = event_queue(config.events.capacity, metrics.clone());
        let watchdog = CommandWatchdog::new(config.timing.watchdog_timeout(), clock.now());
        let status = Arc::new(ArcSwap::from_pointee(BoardStatus {
            hall,
            ..BoardStatus::default()
        }));

        info!("Board up: {}, hall {}", machine.state(), hall);

        let board = Board {
            filter: config.can.command_filter(),
            config,
            machine,
            interlock,
            watchdog,
            queue,
            metrics,
            status,
            can,
            pwm,
            hall_pins,
            power,
            clock,
            delay,
            go_reported: hall.go_magnet_present,
            last_trailer: None,
            cycles: 0,
        };
        Ok((board, handle))
    }
}

pub struct Board {
    config: BoardConfig,
    machine: KillStateMachine,
    interlock: HallInterlock,
    watchdog: CommandWatchdog,
    filter: AcceptanceFilter,
    queue: EventQueue,
    metrics: Arc<BoardMetrics>,
    status: Arc<ArcSwap<BoardStatus>>,
    can: Box<dyn TxAdapter + Send>,
    pwm: Box<dyn PwmOutput + Send>,
    hall_pins: Box<dyn HallPins + Send>,
    power: Box<dyn PowerRails + Send>,
    clock: Box<dyn Clock + Send>,
    delay: Box<dyn Delay + Send>,
    /// Go level last reported on the bus
    go_reported: bool,
    /// CR, HS, UA of the last thrust frame
    last_trailer: Option<(u8, u8, u8)>,
    cycles: u64,
}

impl Board {
    pub fn state(&self) -> KillState {
        self.machine.state()
    }

    pub fn status(&self) -> BoardStatus {
        **self.status.load()
    }

    pub fn status_reader(&self) -> StatusReader {
        StatusReader::new(self.status.clone())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn shared_metrics(&self) -> Arc<BoardMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// One cycle without waiting.
    pub fn poll(&mut self) -> Result<usize, DriverError> {
        self.poll_timeout(Duration::ZERO)
    }

    /// One cycle, waiting up to `timeout` for the first event. Returns the
    /// number of events processed, or `ChannelClosed` once every
    /// [`InterruptHandle`] is gone and the queue is drained.
    pub fn poll_timeout(&mut self, timeout: Duration) -> Result<usize, DriverError> {
        let mut processed = 0;
        let mut closed = false;

        let mut next = self.queue.wait(timeout);
        loop {
            match next {
                Ok(Some(event)) => {
                    self.process(event);
                    processed += 1;
                },
                Ok(None) => break,
                Err(DriverError::ChannelClosed) => {
                    closed = true;
                    break;
                },
                Err(e) => return Err(e),
            }
            next = self.queue.try_next();
        }

        self.sample_hall();
        self.publish();

        if closed && processed == 0 {
            return Err(DriverError::ChannelClosed);
        }
        Ok(processed)
    }

    /// Poll until `stop` is set or the event channel closes.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), DriverError> {
        let interval = self.config.timing.poll_interval();
        while !stop.load(Ordering::Acquire) {
            match self.poll_timeout(interval) {
                Ok(_) => {},
                Err(DriverError::ChannelClosed) => {
                    info!("Event channel closed, board loop exiting");
                    return Ok(());
                },
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn process(&mut self, event: BoardEvent) {
        match event {
            BoardEvent::CanFrame(frame) => self.handle_frame(frame),
            BoardEvent::WatchdogTick => self.check_watchdog(),
            BoardEvent::StatusTick => self.refresh_status(),
            BoardEvent::HallEdge => {
                BoardMetrics::incr(&self.metrics.hall_edges);
                self.sample_hall();
            },
        }
    }

    fn handle_frame(&mut self, frame: TkbFrame) {
        if frame.is_extended || !self.filter.matches(frame.id) {
            BoardMetrics::incr(&self.metrics.rx_frames_filtered);
            trace!("Filtered frame 0x{:03X}", frame.id);
            return;
        }

        let event = match Command::decode(&frame) {
            Command::Kill(command) => {
                debug!("Kill command {}", command);
                KillEvent::from(command)
            },
            Command::Thrust(thrust) => {
                trace!("Thrust {} {:.3}", thrust.thruster, thrust.speed);
                self.last_trailer = Some((thrust.cr, thrust.hs, thrust.ua));
                KillEvent::Thrust(thrust.command())
            },
            Command::Unrecognized => {
                BoardMetrics::incr(&self.metrics.commands_unrecognized);
                debug!(
                    "Dropped unrecognized frame 0x{:03X}: {}",
                    frame.id,
                    render_payload(frame.data_slice())
                );
                return;
            },
        };

        BoardMetrics::incr(&self.metrics.commands_accepted);
        self.watchdog.record(self.clock.now());
        self.dispatch(event);
    }

    fn check_watchdog(&mut self) {
        let now = self.clock.now();
        if let WatchdogStatus::Expired { elapsed } = self.watchdog.check(now) {
            BoardMetrics::incr(&self.metrics.watchdog_timeouts);
            if self.machine.state().is_running() {
                warn!("No command for {:?}, soft killing", elapsed);
            }
            self.dispatch(KillEvent::CommandTimeout);
        }
    }

    /// Re-send the current kill status and the go level.
    fn refresh_status(&mut self) {
        let kill_status = self.machine.last_status();
        self.send_status(kill_status);
        self.send_status(StatusEvent::go(self.go_reported));
    }

    fn sample_hall(&mut self) {
        let sample = self.interlock.sample(&mut *self.hall_pins);
        let reading = sample.reading;

        if sample.on_off_removed {
            info!("On/off magnet removed");
            self.dispatch(KillEvent::OnOffMagnetRemoved);
        }
        if reading.soft_kill_magnet_present {
            self.dispatch(KillEvent::SoftKillMagnetPresent);
        }
        if !reading.go_magnet_present {
            self.dispatch(KillEvent::GoMagnetAbsent);
        }
        if reading.go_magnet_present != self.go_reported {
            self.go_reported = reading.go_magnet_present;
            self.send_status(StatusEvent::go(self.go_reported));
        }
    }

    fn send_status(&mut self, status: StatusEvent) {
        let mut tx = MeteredTx {
            inner: &mut *self.can,
            metrics: &self.metrics,
        };
        if let Err(e) = tx.send(status.to_frame(self.config.can.status_id)) {
            warn!("Failed to send {} status: {}", status, e);
        }
    }

    /// Hand one event to the state machine and account for the outcome.
    fn dispatch(&mut self, event: KillEvent) {
        let before = self.machine.state();
        let hall = self.interlock.reading();

        let mut tx = MeteredTx {
            inner: &mut *self.can,
            metrics: &self.metrics,
        };
        let mut io = Actuators {
            can: &mut tx,
            pwm: &mut *self.pwm,
            power: &mut *self.power,
            delay: &mut *self.delay,
        };

        match self.machine.handle(event, &hall, &mut io) {
            Ok(Some(transition)) => {
                BoardMetrics::incr(&self.metrics.transitions);
                info!(
                    "{} -> {} on {:?}",
                    transition.from, transition.to, transition.event
                );
            },
            Ok(None) => {
                if matches!(event, KillEvent::Thrust(_)) && before.is_running() {
                    BoardMetrics::incr(&self.metrics.thrust_applied);
                }
            },
            Err(e) => {
                if self.machine.state() != before {
                    BoardMetrics::incr(&self.metrics.transitions);
                }
                warn!("{} -> {} on {:?}: {}", before, self.machine.state(), event, e);
            },
        }

        // The unkill sequences block for the ESC power-up delay; command age
        // restarts once the board is actually running again.
        if self.machine.state().is_running() && !before.is_running() {
            self.watchdog.record(self.clock.now());
        }
    }

    fn publish(&mut self) {
        self.cycles += 1;
        let now = self.clock.now();
        let (last_cr, last_hs, last_ua) = match self.last_trailer {
            Some((cr, hs, ua)) => (Some(cr), Some(hs), Some(ua)),
            None => (None, None, None),
        };
        self.status.store(Arc::new(BoardStatus {
            state: self.machine.state(),
            hall: self.interlock.reading(),
            last_status: self.machine.last_status(),
            last_cr,
            last_hs,
            last_ua,
            last_command_age: self.watchdog.last_command_age(now),
            uptime: now,
            cycles: self.cycles,
        }));
    }
}
