//! Send a command frame over SocketCAN

use crate::utils::{KillArg, format_frame, parse_can_id, parse_speed, parse_thruster};
use anyhow::Result;
use clap::{Args, Subcommand};
use tkb_protocol::{ID_KILL_COMMAND, ID_THRUST_COMMAND, KillCommand, ThrustFrame, ThrusterId, TkbFrame};

#[derive(Args, Debug)]
pub struct SendCommand {
    /// SocketCAN interface
    #[arg(short, long, default_value = "can0")]
    pub interface: String,

    /// Repeat the frame this many times
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// Milliseconds between repeats
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,

    #[command(subcommand)]
    pub frame: SendFrame,
}

#[derive(Subcommand, Debug)]
pub enum SendFrame {
    Kill {
        #[arg(value_enum)]
        command: KillArg,

        #[arg(long, value_parser = parse_can_id, default_value_t = ID_KILL_COMMAND)]
        id: u16,
    },
    Thrust {
        #[arg(value_parser = parse_thruster)]
        thruster: ThrusterId,

        #[arg(value_parser = parse_speed, allow_hyphen_values = true)]
        speed: f32,

        #[arg(long, value_parser = parse_can_id, default_value_t = ID_THRUST_COMMAND)]
        id: u16,
    },
}

impl SendFrame {
    pub fn frame(&self) -> TkbFrame {
        match *self {
            SendFrame::Kill { command, id } => KillCommand::from(command).to_frame(id),
            SendFrame::Thrust { thruster, speed, id } => ThrustFrame::new(thruster, speed).to_frame(id),
        }
    }
}

impl SendCommand {
    #[cfg(target_os = "linux")]
    pub fn execute(&self) -> Result<()> {
        use anyhow::Context;
        use std::time::Duration;
        use tkb_can::{CanAdapter, SocketCanAdapter};

        let mut adapter = SocketCanAdapter::new(self.interface.as_str())
            .with_context(|| format!("opening {}", self.interface))?;
        let frame = self.frame.frame();

        for i in 0..self.count {
            if i > 0 {
                std::thread::sleep(Duration::from_millis(self.interval_ms));
            }
            adapter.send(frame).context("sending frame")?;
            tracing::info!("{} {}", self.interface, format_frame(&frame));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn execute(&self) -> Result<()> {
        anyhow::bail!(
            "SocketCAN is only available on Linux (would send {})",
            format_frame(&self.frame.frame())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_frame_builds_commands() {
        let kill = SendFrame::Kill {
            command: KillArg::SoftUnkill,
            id: ID_KILL_COMMAND,
        };
        assert_eq!(kill.frame().data_slice(), b"KCSU\0");

        let thrust = SendFrame::Thrust {
            thruster: ThrusterId::BackVerticalLeft,
            speed: 0.0,
            id: 0x105,
        };
        assert_eq!(format_frame(&thrust.frame()), "105#5406000000000000");
    }
}
