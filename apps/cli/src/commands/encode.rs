//! Encode frames in candump notation

use crate::utils::{KillArg, StatusArg, format_frame, parse_can_id, parse_speed, parse_thruster};
use anyhow::Result;
use clap::Subcommand;
use tkb_protocol::{
    ID_KILL_COMMAND, ID_THRUST_COMMAND, ID_TKB_STATUS, KillCommand, StatusEvent, ThrustFrame,
    ThrusterId, TkbFrame,
};

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Kill command (mothership → board)
    Kill {
        #[arg(value_enum)]
        command: KillArg,

        #[arg(long, value_parser = parse_can_id, default_value_t = ID_KILL_COMMAND)]
        id: u16,
    },

    /// Thrust command (mothership → board)
    Thrust {
        /// FHL, FHR, FVL, FVR, BHL, BHR, BVL, BVR or 0-7
        #[arg(value_parser = parse_thruster)]
        thruster: ThrusterId,

        /// Normalized speed in [-1, 1]
        #[arg(value_parser = parse_speed, allow_hyphen_values = true)]
        speed: f32,

        #[arg(long, default_value_t = 0)]
        cr: u8,

        #[arg(long, default_value_t = 0)]
        hs: u8,

        #[arg(long, default_value_t = 0)]
        ua: u8,

        #[arg(long, value_parser = parse_can_id, default_value_t = ID_THRUST_COMMAND)]
        id: u16,
    },

    /// Status frame (board → mothership)
    Status {
        #[arg(value_enum)]
        status: StatusArg,

        #[arg(long, value_parser = parse_can_id, default_value_t = ID_TKB_STATUS)]
        id: u16,
    },
}

impl EncodeCommand {
    pub fn frame(&self) -> TkbFrame {
        match *self {
            EncodeCommand::Kill { command, id } => KillCommand::from(command).to_frame(id),
            EncodeCommand::Thrust {
                thruster,
                speed,
                cr,
                hs,
                ua,
                id,
            } => ThrustFrame {
                thruster,
                speed,
                cr,
                hs,
                ua,
            }
            .to_frame(id),
            EncodeCommand::Status { status, id } => StatusEvent::from(status).to_frame(id),
        }
    }

    pub fn execute(&self) -> Result<()> {
        println!("{}", format_frame(&self.frame()));
        Ok(())
    }
}
