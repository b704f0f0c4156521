//! Kill state machine.
//!
//! The single owner of [`KillState`]. Every state change goes through
//! [`KillStateMachine::handle`], which performs the transition's side effects
//! (PWM, power rails, status frames) exactly once and commits the new state.
//!
//! | From | Event | To |
//! |---|---|---|
//! | Running, SoftKilled | hard kill request, on/off magnet removed | HardKilled |
//! | HardKilled | hard unkill request | Running |
//! | Running | soft kill request, soft-kill magnet, go magnet absent, timeout | SoftKilled |
//! | SoftKilled | soft unkill request with go and on/off magnets present | Running |
//! | Running | thrust command | Running (pulse applied) |
//!
//! Anything else is ignored without side effects. Status transmit failures do
//! not abort a sequence: the remaining steps still run, the state is committed,
//! and the first failure is returned as [`DriverError::Transport`].

use crate::error::DriverError;
use crate::hal::{Delay, PowerRails, PwmOutput};
use crate::hall::HallReading;
use crate::thrust::ThrustMapper;
use std::fmt;
use std::time::Duration;
use tkb_can::{CanError, TxAdapter};
use tkb_protocol::{KillCommand, StatusEvent, ThrustCommand};
use tracing::{debug, trace};

/// Safety state of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum KillState {
    Running = 0,
    SoftKilled = 1,
    /// Boot state
    #[default]
    HardKilled = 2,
}

impl KillState {
    /// Invalid values map to `HardKilled`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::SoftKilled,
            _ => Self::HardKilled,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for KillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KillState::Running => "Running",
            KillState::SoftKilled => "SoftKilled",
            KillState::HardKilled => "HardKilled",
        };
        f.write_str(name)
    }
}

/// Semantic input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KillEvent {
    HardKillRequest,
    SoftKillRequest,
    HardUnkillRequest,
    SoftUnkillRequest,
    OnOffMagnetRemoved,
    SoftKillMagnetPresent,
    GoMagnetAbsent,
    CommandTimeout,
    Thrust(ThrustCommand),
}

impl From<KillCommand> for KillEvent {
    fn from(command: KillCommand) -> Self {
        match command {
            KillCommand::HardKill => KillEvent::HardKillRequest,
            KillCommand::SoftKill => KillEvent::SoftKillRequest,
            KillCommand::HardUnkill => KillEvent::HardUnkillRequest,
            KillCommand::SoftUnkill => KillEvent::SoftUnkillRequest,
        }
    }
}

/// A committed state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: KillState,
    pub to: KillState,
    pub event: KillEvent,
}

/// Blocking waits inside the kill/unkill sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillTiming {
    /// Between the soft-kill status and cutting main power
    pub hard_kill_delay: Duration,
    /// After powering the thrusters, before re-arming the ESCs
    pub esc_power_up_delay: Duration,
}

impl Default for KillTiming {
    fn default() -> Self {
        Self {
            hard_kill_delay: Duration::from_secs(5),
            esc_power_up_delay: Duration::from_secs(2),
        }
    }
}

/// Peripherals a transition may touch, borrowed for one `handle` call.
pub struct Actuators<'a> {
    pub can: &'a mut dyn TxAdapter,
    pub pwm: &'a mut dyn PwmOutput,
    pub power: &'a mut dyn PowerRails,
    pub delay: &'a mut dyn Delay,
}

enum Sequence {
    HardKill,
    HardUnkill,
    SoftKill,
    SoftUnkill,
}

pub struct KillStateMachine {
    state: KillState,
    last_status: StatusEvent,
    mapper: ThrustMapper,
    status_id: u16,
    timing: KillTiming,
}

impl KillStateMachine {
    pub fn new(mapper: ThrustMapper, status_id: u16, timing: KillTiming) -> Self {
        Self {
            state: KillState::HardKilled,
            last_status: StatusEvent::HardKilled,
            mapper,
            status_id,
            timing,
        }
    }

    pub fn state(&self) -> KillState {
        self.state
    }

    /// Kill status reported by the last transition (`KRHA` at boot).
    pub fn last_status(&self) -> StatusEvent {
        self.last_status
    }

    pub fn mapper(&self) -> &ThrustMapper {
        &self.mapper
    }

    pub fn status_id(&self) -> u16 {
        self.status_id
    }

    /// Drive the outputs into the `HardKilled` shape at boot: neutral pulses,
    /// PWM gated, both rails off. No status frame.
    pub fn enter_safe_state(&mut self, io: &mut Actuators<'_>) {
        self.mapper.stop_all(io.pwm);
        io.pwm.set_output_enabled(false);
        io.power.set_thruster_power(false);
        io.power.set_main_power(false);
        self.state = KillState::HardKilled;
        self.last_status = StatusEvent::HardKilled;
    }

    /// Apply one event. `hall` is the current debounced interlock reading,
    /// consulted by the soft-unkill guard.
    pub fn handle(
        &mut self,
        event: KillEvent,
        hall: &HallReading,
        io: &mut Actuators<'_>,
    ) -> Result<Option<Transition>, DriverError> {
        use KillEvent::*;
        use KillState::*;

        let (sequence, next) = match (self.state, event) {
            (Running | SoftKilled, HardKillRequest | OnOffMagnetRemoved) => {
                (Sequence::HardKill, HardKilled)
            },
            (HardKilled, HardUnkillRequest) if !hall.holds_soft_kill() => {
                (Sequence::HardUnkill, Running)
            },
            (HardKilled, HardUnkillRequest) => {
                debug!("Hard unkill refused: {}", hall);
                return Ok(None);
            },
            (Running, SoftKillRequest | SoftKillMagnetPresent | GoMagnetAbsent | CommandTimeout) => {
                (Sequence::SoftKill, SoftKilled)
            },
            (SoftKilled, SoftUnkillRequest) if hall.permits_unkill() => {
                (Sequence::SoftUnkill, Running)
            },
            (SoftKilled, SoftUnkillRequest) => {
                debug!("Soft unkill refused: {}", hall);
                return Ok(None);
            },
            (Running, Thrust(command)) => {
                let pulse = self.mapper.apply(&command, io.pwm);
                trace!("Thrust {} -> {} ticks", pulse.channel, pulse.ticks);
                return Ok(None);
            },
            _ => return Ok(None),
        };

        let mut failure = None;
        match sequence {
            Sequence::HardKill => self.hard_kill(io, &mut failure),
            Sequence::HardUnkill => self.hard_unkill(io, &mut failure),
            Sequence::SoftKill => self.soft_kill(io, &mut failure),
            Sequence::SoftUnkill => self.soft_unkill(io, &mut failure),
        }

        let from = self.state;
        self.state = next;

        match failure {
            Some(source) => Err(DriverError::Transport {
                state: next,
                source,
            }),
            None => Ok(Some(Transition {
                from,
                to: next,
                event,
            })),
        }
    }

    fn transmit(&mut self, io: &mut Actuators<'_>, status: StatusEvent, failure: &mut Option<CanError>) {
        self.last_status = status;
        if let Err(e) = io.can.send(status.to_frame(self.status_id)) {
            debug!("Transmit of {} failed: {}", status, e);
            failure.get_or_insert(e);
        }
    }

    /// Stop, gate, cut thruster power, report soft-killed.
    fn soft_kill(&mut self, io: &mut Actuators<'_>, failure: &mut Option<CanError>) {
        self.mapper.stop_all(io.pwm);
        io.pwm.set_output_enabled(false);
        io.power.set_thruster_power(false);
        self.transmit(io, StatusEvent::SoftKilled, failure);
    }

    fn hard_kill(&mut self, io: &mut Actuators<'_>, failure: &mut Option<CanError>) {
        self.soft_kill(io, failure);
        io.delay.delay(self.timing.hard_kill_delay);
        io.power.set_main_power(false);
        self.transmit(io, StatusEvent::HardKilled, failure);
    }

    /// Power the ESCs, let them boot, then arm them with neutral pulses.
    fn arm_escs(&mut self, io: &mut Actuators<'_>) {
        io.power.set_thruster_power(true);
        io.delay.delay(self.timing.esc_power_up_delay);
        self.mapper.stop_all(io.pwm);
        io.pwm.set_output_enabled(true);
    }

    fn hard_unkill(&mut self, io: &mut Actuators<'_>, failure: &mut Option<CanError>) {
        io.power.set_main_power(true);
        self.arm_escs(io);
        self.transmit(io, StatusEvent::HardUnkilled, failure);
    }

    fn soft_unkill(&mut self, io: &mut Actuators<'_>, failure: &mut Option<CanError>) {
        self.arm_escs(io);
        self.transmit(io, StatusEvent::SoftUnkilled, failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Clock;
    use crate::sim::{Actuation, ActuationLog, ManualClock, SimPowerRails, SimPwm};
    use tkb_can::MockCanAdapter;
    use tkb_protocol::ThrusterId;

    struct Rig {
        can: MockCanAdapter,
        pwm: SimPwm,
        power: SimPowerRails,
        clock: ManualClock,
        log: ActuationLog,
    }

    impl Rig {
        fn new() -> Self {
            let log = ActuationLog::new();
            let clock = ManualClock::new();
            Self {
                can: MockCanAdapter::new(),
                pwm: SimPwm::with_log(log.clone()),
                power: SimPowerRails::with_log(log.clone()),
                clock: clock.with_log(log.clone()),
                log,
            }
        }

        fn handle(
            &mut self,
            machine: &mut KillStateMachine,
            event: KillEvent,
            hall: &HallReading,
        ) -> Result<Option<Transition>, DriverError> {
            let mut can = self.can.clone();
            let mut pwm = self.pwm.clone();
            let mut power = self.power.clone();
            let mut delay = self.clock.delay();
            let mut io = Actuators {
                can: &mut can,
                pwm: &mut pwm,
                power: &mut power,
                delay: &mut delay,
            };
            machine.handle(event, hall, &mut io)
        }
    }

    const ALL_MAGNETS_OK: HallReading = HallReading {
        soft_kill_magnet_present: false,
        go_magnet_present: true,
        on_off_magnet_present: true,
    };

    fn machine() -> KillStateMachine {
        KillStateMachine::new(
            ThrustMapper::new(Default::default(), 16_000_000),
            0x110,
            KillTiming::default(),
        )
    }

    fn running(rig: &mut Rig) -> KillStateMachine {
        let mut m = machine();
        rig.handle(&mut m, KillEvent::HardUnkillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        rig.can.take_sent();
        rig.log.clear();
        m
    }

    #[test]
    fn test_initial_state_is_hard_killed() {
        let m = machine();
        assert_eq!(m.state(), KillState::HardKilled);
        assert_eq!(m.last_status(), StatusEvent::HardKilled);
    }

    #[test]
    fn test_hard_killed_ignores_everything_but_hard_unkill() {
        let mut rig = Rig::new();
        let mut m = machine();
        let events = [
            KillEvent::HardKillRequest,
            KillEvent::SoftKillRequest,
            KillEvent::SoftUnkillRequest,
            KillEvent::OnOffMagnetRemoved,
            KillEvent::SoftKillMagnetPresent,
            KillEvent::GoMagnetAbsent,
            KillEvent::CommandTimeout,
            KillEvent::Thrust(ThrustCommand::new(ThrusterId::FrontHorizontalLeft, 1.0)),
        ];
        for event in events {
            assert_eq!(rig.handle(&mut m, event, &ALL_MAGNETS_OK).unwrap(), None);
            assert_eq!(m.state(), KillState::HardKilled);
        }
        assert!(rig.can.sent_frames().is_empty());
        assert!(rig.log.entries().is_empty());
    }

    #[test]
    fn test_hard_unkill_sequence() {
        let mut rig = Rig::new();
        let mut m = machine();
        let transition = rig
            .handle(&mut m, KillEvent::HardUnkillRequest, &ALL_MAGNETS_OK)
            .unwrap()
            .unwrap();
        assert_eq!(transition.from, KillState::HardKilled);
        assert_eq!(transition.to, KillState::Running);

        let neutral = m.mapper().stop_all_batch().to_vec();
        assert_eq!(
            rig.log.entries(),
            vec![
                Actuation::MainPower(true),
                Actuation::ThrusterPower(true),
                Actuation::Delay(Duration::from_secs(2)),
                Actuation::PulseBatch(neutral),
                Actuation::OutputEnabled(true),
            ]
        );
        assert_eq!(rig.can.sent_payloads(), vec![b"KRHU\0".to_vec()]);
        assert_eq!(m.last_status(), StatusEvent::HardUnkilled);
    }

    #[test]
    fn test_timeout_from_running_soft_kills() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        let transition = rig
            .handle(&mut m, KillEvent::CommandTimeout, &ALL_MAGNETS_OK)
            .unwrap()
            .unwrap();
        assert_eq!(transition.to, KillState::SoftKilled);
        assert_eq!(rig.can.sent_payloads(), vec![b"KRSA\0".to_vec()]);
        // main power stays up on a soft kill
        assert!(!rig.power.thruster_power());
        assert!(rig.power.main_power());
        assert!(!rig.log.entries().contains(&Actuation::MainPower(false)));
    }

    #[test]
    fn test_soft_kill_triggers_from_running() {
        for event in [
            KillEvent::SoftKillRequest,
            KillEvent::SoftKillMagnetPresent,
            KillEvent::GoMagnetAbsent,
            KillEvent::CommandTimeout,
        ] {
            let mut rig = Rig::new();
            let mut m = running(&mut rig);
            rig.handle(&mut m, event, &ALL_MAGNETS_OK).unwrap();
            assert_eq!(m.state(), KillState::SoftKilled, "{:?}", event);
            assert!(!rig.pwm.output_enabled());
        }
    }

    #[test]
    fn test_soft_kill_events_ignored_when_soft_killed() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        rig.handle(&mut m, KillEvent::SoftKillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        rig.can.take_sent();
        for event in [
            KillEvent::SoftKillRequest,
            KillEvent::CommandTimeout,
            KillEvent::GoMagnetAbsent,
            KillEvent::HardUnkillRequest,
        ] {
            assert_eq!(rig.handle(&mut m, event, &ALL_MAGNETS_OK).unwrap(), None);
        }
        assert!(rig.can.sent_frames().is_empty());
    }

    #[test]
    fn test_hard_kill_sequence_from_running() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        rig.handle(&mut m, KillEvent::HardKillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        assert_eq!(m.state(), KillState::HardKilled);
        assert_eq!(
            rig.can.sent_payloads(),
            vec![b"KRSA\0".to_vec(), b"KRHA\0".to_vec()]
        );

        let neutral = m.mapper().stop_all_batch().to_vec();
        assert_eq!(
            rig.log.entries(),
            vec![
                Actuation::PulseBatch(neutral),
                Actuation::OutputEnabled(false),
                Actuation::ThrusterPower(false),
                Actuation::Delay(Duration::from_secs(5)),
                Actuation::MainPower(false),
            ]
        );
        assert_eq!(rig.clock.now(), Duration::from_secs(7));
    }

    #[test]
    fn test_on_off_removal_hard_kills_from_soft_killed() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        rig.handle(&mut m, KillEvent::SoftKillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        rig.can.take_sent();

        let transition = rig
            .handle(&mut m, KillEvent::OnOffMagnetRemoved, &ALL_MAGNETS_OK)
            .unwrap()
            .unwrap();
        assert_eq!(transition.from, KillState::SoftKilled);
        assert_eq!(transition.to, KillState::HardKilled);
        assert_eq!(
            rig.can.sent_payloads(),
            vec![b"KRSA\0".to_vec(), b"KRHA\0".to_vec()]
        );
    }

    #[test]
    fn test_soft_unkill_requires_clear_interlock() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        rig.handle(&mut m, KillEvent::SoftKillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        rig.can.take_sent();

        let no_go = HallReading {
            go_magnet_present: false,
            ..ALL_MAGNETS_OK
        };
        let no_on_off = HallReading {
            on_off_magnet_present: false,
            ..ALL_MAGNETS_OK
        };
        let soft_kill_held = HallReading {
            soft_kill_magnet_present: true,
            ..ALL_MAGNETS_OK
        };
        rig.log.clear();
        for hall in [no_go, no_on_off, soft_kill_held] {
            assert_eq!(
                rig.handle(&mut m, KillEvent::SoftUnkillRequest, &hall).unwrap(),
                None
            );
            assert_eq!(m.state(), KillState::SoftKilled);
        }
        assert!(rig.can.sent_frames().is_empty());
        assert!(rig.log.is_empty());

        rig.handle(&mut m, KillEvent::SoftUnkillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        assert_eq!(m.state(), KillState::Running);
        assert_eq!(rig.can.sent_payloads(), vec![b"KRSU\0".to_vec()]);
        assert!(rig.pwm.output_enabled());
        assert!(rig.power.thruster_power());
    }

    #[test]
    fn test_hard_unkill_refused_while_soft_kill_held() {
        let mut rig = Rig::new();
        let mut m = machine();
        let soft_kill_held = HallReading {
            soft_kill_magnet_present: true,
            ..ALL_MAGNETS_OK
        };
        let no_go = HallReading {
            go_magnet_present: false,
            ..ALL_MAGNETS_OK
        };
        for hall in [soft_kill_held, no_go] {
            assert_eq!(
                rig.handle(&mut m, KillEvent::HardUnkillRequest, &hall).unwrap(),
                None
            );
            assert_eq!(m.state(), KillState::HardKilled);
        }
        assert!(rig.can.sent_frames().is_empty());
        assert!(rig.log.is_empty());
        assert!(!rig.power.main_power());
    }

    #[test]
    fn test_thrust_applied_only_while_running() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        let command = ThrustCommand::new(ThrusterId::FrontHorizontalLeft, 1.0);
        assert_eq!(
            rig.handle(&mut m, KillEvent::Thrust(command), &ALL_MAGNETS_OK)
                .unwrap(),
            None
        );
        assert_eq!(rig.pwm.width(ThrusterId::FrontHorizontalLeft), Some(30_400));

        rig.handle(&mut m, KillEvent::SoftKillRequest, &ALL_MAGNETS_OK)
            .unwrap();
        let command = ThrustCommand::new(ThrusterId::FrontHorizontalLeft, -1.0);
        rig.handle(&mut m, KillEvent::Thrust(command), &ALL_MAGNETS_OK)
            .unwrap();
        assert_eq!(rig.pwm.width(ThrusterId::FrontHorizontalLeft), Some(24_000));
    }

    #[test]
    fn test_transport_failure_still_commits() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        rig.can.set_offline(true);

        let err = rig
            .handle(&mut m, KillEvent::HardKillRequest, &ALL_MAGNETS_OK)
            .unwrap_err();
        assert_eq!(err.committed_state(), Some(KillState::HardKilled));
        assert_eq!(m.state(), KillState::HardKilled);
        // both transmits were attempted, main power was still cut
        assert_eq!(rig.can.failed_send_count(), 2);
        assert!(!rig.power.main_power());
        assert_eq!(m.last_status(), StatusEvent::HardKilled);
    }

    #[test]
    fn test_enter_safe_state() {
        let mut rig = Rig::new();
        let mut m = running(&mut rig);
        let mut can = rig.can.clone();
        let mut pwm = rig.pwm.clone();
        let mut power = rig.power.clone();
        let mut delay = rig.clock.delay();
        m.enter_safe_state(&mut Actuators {
            can: &mut can,
            pwm: &mut pwm,
            power: &mut power,
            delay: &mut delay,
        });
        assert_eq!(m.state(), KillState::HardKilled);
        assert!(!rig.power.main_power());
        assert!(!rig.pwm.output_enabled());
        assert!(rig.can.sent_frames().is_empty());
    }

    #[test]
    fn test_kill_state_u8_round_trip() {
        for state in [KillState::Running, KillState::SoftKilled, KillState::HardKilled] {
            assert_eq!(KillState::from_u8(state.as_u8()), state);
        }
        assert_eq!(KillState::from_u8(200), KillState::HardKilled);
        assert_eq!(KillState::default(), KillState::HardKilled);
    }
}
