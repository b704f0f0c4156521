//! Bench: a board wired to simulated peripherals.
#![allow(dead_code)]

use tkb_can::MockCanAdapter;
use tkb_driver::sim::{ActuationLog, ManualClock, SimHallPins, SimPowerRails, SimPwm};
use tkb_driver::{Board, BoardBuilder, BoardConfig, HallPin, InterruptHandle, KillState};
use tkb_protocol::{ID_KILL_COMMAND, ID_THRUST_COMMAND, KillCommand, ThrustFrame, ThrusterId, TkbFrame};

pub struct Bench {
    pub board: Board,
    pub handle: InterruptHandle,
    pub can: MockCanAdapter,
    pub pwm: SimPwm,
    pub hall: SimHallPins,
    pub power: SimPowerRails,
    pub clock: ManualClock,
    pub log: ActuationLog,
}

/// Default config with single-sample hall acceptance.
pub fn bench_config() -> BoardConfig {
    let mut config = BoardConfig::default();
    config.hall.debounce_samples = 1;
    config
}

impl Bench {
    /// HardKilled, go and on/off magnets in place.
    pub fn new() -> Self {
        Self::with_config(bench_config())
    }

    pub fn with_config(config: BoardConfig) -> Self {
        let log = ActuationLog::new();
        let can = MockCanAdapter::new();
        let pwm = SimPwm::with_log(log.clone());
        let power = SimPowerRails::with_log(log.clone());
        let clock = ManualClock::new().with_log(log.clone());
        let hall = SimHallPins::new(config.hall.activation_level);
        hall.set_magnet(HallPin::Go, true);
        hall.set_magnet(HallPin::OnOff, true);

        let (board, handle) = BoardBuilder::new()
            .config(config)
            .can(can.clone())
            .pwm(pwm.clone())
            .hall_pins(hall.clone())
            .power_rails(power.clone())
            .clock(clock.clone())
            .delay(clock.delay())
            .build()
            .expect("bench board");

        Self {
            board,
            handle,
            can,
            pwm,
            hall,
            power,
            clock,
            log,
        }
    }

    /// Hard-unkilled into Running, with the bus and the log cleared.
    pub fn running() -> Self {
        let mut bench = Self::new();
        bench.kill(KillCommand::HardUnkill);
        assert_eq!(bench.board.state(), KillState::Running);
        bench.clear();
        bench
    }

    pub fn poll(&mut self) -> usize {
        self.board.poll().expect("poll")
    }

    pub fn frame(&mut self, frame: TkbFrame) {
        assert!(self.handle.can_frame(frame), "event queue full");
        self.poll();
    }

    pub fn kill(&mut self, command: KillCommand) {
        self.frame(command.to_frame(ID_KILL_COMMAND));
    }

    pub fn thrust(&mut self, thruster: ThrusterId, speed: f32) {
        self.frame(ThrustFrame::new(thruster, speed).to_frame(ID_THRUST_COMMAND));
    }

    /// Move a magnet and let the board sample it.
    pub fn magnet(&mut self, pin: HallPin, present: bool) {
        self.hall.set_magnet(pin, present);
        self.handle.hall_edge();
        self.poll();
    }

    /// Payloads sent since the last call.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.can
            .take_sent()
            .iter()
            .map(|f| f.data_slice().to_vec())
            .collect()
    }

    pub fn clear(&self) {
        self.can.take_sent();
        self.log.clear();
    }
}
