//! Scripted scenarios against a board wired to simulated peripherals
//!
//! Time only moves on `wait` steps and through the kill sequences' delays,
//! so a scenario prints the same output on every run.

use crate::utils::{parse_speed, parse_thruster};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tkb_can::MockCanAdapter;
use tkb_driver::sim::{ManualClock, SimHallPins, SimPowerRails, SimPwm};
use tkb_driver::{Board, BoardBuilder, BoardConfig, Clock, HallPin, InterruptHandle};
use tkb_protocol::{KillCommand, ThrustFrame, ThrusterId, TkbFrame, render_payload};

#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// Scenario step, repeatable. Forms: `kill <hard-kill|soft-kill|hard-unkill|soft-unkill>`,
    /// `thrust <THR> <speed>`, `magnet <soft-kill|go|on-off> <on|off>`, `wait <ms>`, `status`
    #[arg(long = "step")]
    pub steps: Vec<SimStep>,

    /// Board configuration file (defaults apply otherwise)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq)]
pub enum SimStep {
    Kill(KillCommand),
    Thrust(ThrusterId, f32),
    Magnet(HallPin, bool),
    Wait(Duration),
    Status,
}

impl FromStr for SimStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        match words.as_slice() {
            ["kill", which] => {
                let command = match *which {
                    "hard-kill" => KillCommand::HardKill,
                    "soft-kill" => KillCommand::SoftKill,
                    "hard-unkill" => KillCommand::HardUnkill,
                    "soft-unkill" => KillCommand::SoftUnkill,
                    other => return Err(format!("unknown kill command '{}'", other)),
                };
                Ok(SimStep::Kill(command))
            },
            ["thrust", thruster, speed] => Ok(SimStep::Thrust(parse_thruster(thruster)?, parse_speed(speed)?)),
            ["magnet", pin, position] => {
                let pin = match *pin {
                    "soft-kill" => HallPin::SoftKill,
                    "go" => HallPin::Go,
                    "on-off" => HallPin::OnOff,
                    other => return Err(format!("unknown magnet '{}'", other)),
                };
                let present = match *position {
                    "on" => true,
                    "off" => false,
                    other => return Err(format!("magnet position must be on or off, got '{}'", other)),
                };
                Ok(SimStep::Magnet(pin, present))
            },
            ["wait", ms] => {
                let ms: u64 = ms.parse().map_err(|_| format!("invalid wait '{}'", ms))?;
                Ok(SimStep::Wait(Duration::from_millis(ms)))
            },
            ["status"] => Ok(SimStep::Status),
            _ => Err(format!("unrecognized step '{}'", s)),
        }
    }
}

impl fmt::Display for SimStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimStep::Kill(command) => write!(f, "kill {}", command),
            SimStep::Thrust(thruster, speed) => write!(f, "thrust {} {:+.3}", thruster, speed),
            SimStep::Magnet(pin, present) => {
                write!(f, "magnet {:?} {}", pin, if *present { "on" } else { "off" })
            },
            SimStep::Wait(d) => write!(f, "wait {} ms", d.as_millis()),
            SimStep::Status => f.write_str("status"),
        }
    }
}

/// Hard unkill, fly, lose the link, recover through the go magnet, switch off.
pub fn default_scenario() -> Vec<SimStep> {
    [
        "kill hard-unkill",
        "thrust FHL 0.5",
        "wait 3500",
        "magnet go off",
        "kill soft-unkill",
        "magnet go on",
        "kill soft-unkill",
        "thrust BVR -1.0",
        "magnet on-off off",
        "status",
    ]
    .iter()
    .filter_map(|s| s.parse().ok())
    .collect()
}

/// Board on simulated hardware plus the tick schedule the timers would produce.
pub struct Simulation {
    board: Board,
    handle: InterruptHandle,
    can: MockCanAdapter,
    pwm: SimPwm,
    hall: SimHallPins,
    power: SimPowerRails,
    clock: ManualClock,
    watchdog_period: Duration,
    status_period: Duration,
    next_watchdog: Duration,
    next_status: Duration,
    debounce_samples: u8,
}

/// What a step did, for printing.
#[derive(Debug)]
pub struct StepReport {
    pub at: Duration,
    pub sent: Vec<TkbFrame>,
}

impl Simulation {
    /// Boots HardKilled with the go and on/off magnets in place.
    pub fn new(config: BoardConfig) -> Result<Self> {
        let can = MockCanAdapter::new();
        let pwm = SimPwm::new();
        let power = SimPowerRails::new();
        let clock = ManualClock::new();
        let hall = SimHallPins::new(config.hall.activation_level);
        hall.set_magnet(HallPin::Go, true);
        hall.set_magnet(HallPin::OnOff, true);

        let watchdog_period = config.timing.watchdog_period();
        let status_period = config.timing.status_period();
        let debounce_samples = config.hall.debounce_samples.max(1);

        let (board, handle) = BoardBuilder::new()
            .config(config)
            .can(can.clone())
            .pwm(pwm.clone())
            .hall_pins(hall.clone())
            .power_rails(power.clone())
            .clock(clock.clone())
            .delay(clock.delay())
            .build()
            .context("building simulated board")?;

        Ok(Self {
            board,
            handle,
            can,
            pwm,
            hall,
            power,
            clock,
            watchdog_period,
            status_period,
            next_watchdog: watchdog_period,
            next_status: status_period,
            debounce_samples,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn step(&mut self, step: &SimStep) -> Result<StepReport> {
        let at = self.clock.now();
        match *step {
            SimStep::Kill(command) => {
                let id = self.board.config().can.kill_command_id;
                self.deliver(command.to_frame(id))?;
            },
            SimStep::Thrust(thruster, speed) => {
                let id = self.board.config().can.thrust_command_id;
                self.deliver(ThrustFrame::new(thruster, speed).to_frame(id))?;
            },
            SimStep::Magnet(pin, present) => {
                self.hall.set_magnet(pin, present);
                for _ in 0..self.debounce_samples {
                    self.handle.hall_edge();
                    self.board.poll()?;
                }
            },
            SimStep::Wait(duration) => self.wait(duration)?,
            SimStep::Status => {
                self.handle.status_tick();
                self.board.poll()?;
            },
        }
        Ok(StepReport {
            at,
            sent: self.can.take_sent(),
        })
    }

    fn deliver(&mut self, frame: TkbFrame) -> Result<()> {
        if !self.handle.can_frame(frame) {
            bail!("event queue full");
        }
        self.board.poll()?;
        Ok(())
    }

    /// Advance time, firing watchdog and status ticks when they fall due.
    fn wait(&mut self, duration: Duration) -> Result<()> {
        let target = self.clock.now() + duration;
        loop {
            let next = self.next_watchdog.min(self.next_status);
            if next > target {
                break;
            }
            // kill sequences may already have pushed the clock past `next`
            self.clock.set(next.max(self.clock.now()));
            if self.next_watchdog == next {
                self.handle.watchdog_tick();
                self.next_watchdog += self.watchdog_period;
            }
            if self.next_status == next {
                self.handle.status_tick();
                self.next_status += self.status_period;
            }
            self.board.poll()?;
        }
        self.clock.set(target.max(self.clock.now()));
        Ok(())
    }

    /// One line summary of the outputs.
    pub fn outputs(&self) -> String {
        let widths: Vec<String> = self
            .pwm
            .widths()
            .iter()
            .map(|w| w.map_or_else(|| "-".to_string(), |t| t.to_string()))
            .collect();
        format!(
            "main={} thrusters={} pwm={} [{}]",
            on_off(self.power.main_power()),
            on_off(self.power.thruster_power()),
            on_off(self.pwm.output_enabled()),
            widths.join(" ")
        )
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn render_sent(frames: &[TkbFrame]) -> String {
    let payloads: Vec<String> = frames
        .iter()
        .map(|f| {
            let data = f.data_slice();
            render_payload(data.strip_suffix(&[0]).unwrap_or(data))
        })
        .collect();
    payloads.join(", ")
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = match &self.config {
            Some(path) => BoardConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => BoardConfig::default(),
        };
        let steps = if self.steps.is_empty() {
            default_scenario()
        } else {
            self.steps.clone()
        };

        let mut sim = Simulation::new(config)?;
        println!("{:>8} {:<24} {:<11} sent", "t(ms)", "step", "state");
        println!("{:>8} {:<24} {:<11} -", 0, "boot", sim.board().state());

        for step in &steps {
            let report = sim.step(step)?;
            println!(
                "{:>8} {:<24} {:<11} {}",
                report.at.as_millis(),
                step.to_string(),
                sim.board().state().to_string(),
                render_sent(&report.sent)
            );
            if matches!(step, SimStep::Status) {
                println!("{:>8} {}", "", sim.outputs());
            }
        }

        let m = sim.board().metrics();
        println!(
            "frames rx={} accepted={} tx={} transitions={} watchdog timeouts={}",
            m.rx_frames_total, m.commands_accepted, m.tx_frames_total, m.transitions, m.watchdog_timeouts
        );
        Ok(())
    }
}
