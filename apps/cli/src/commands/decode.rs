//! Decode a frame payload

use crate::utils::parse_frame_arg;
use anyhow::Result;
use clap::Args;
use tkb_protocol::{Command, FrameGroup, ID_KILL_COMMAND, StatusEvent, TkbFrame, render_payload};

#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// Payload as hex (`4B43484100`) or candump notation (`100#4B43484100`)
    pub frame: String,
}

impl DecodeCommand {
    pub fn execute(&self) -> Result<()> {
        let frame = parse_frame_arg(&self.frame, ID_KILL_COMMAND)?;
        println!("{}", describe(&frame));
        Ok(())
    }
}

/// One-line description: classified as a command first, then as a status.
pub fn describe(frame: &TkbFrame) -> String {
    let payload = render_payload(frame.data_slice());
    let group = FrameGroup::from_id(frame.id);

    if let Ok(command) = Command::parse(frame) {
        return match command {
            Command::Kill(kill) => format!("0x{:03X} {:?} kill command {} \"{}\"", frame.id, group, kill, payload),
            Command::Thrust(thrust) => format!(
                "0x{:03X} {:?} thrust {} speed {:+.4} cr=0x{:02X} hs=0x{:02X} ua=0x{:02X}",
                frame.id, group, thrust.thruster, thrust.speed, thrust.cr, thrust.hs, thrust.ua
            ),
            Command::Unrecognized => format!("0x{:03X} {:?} unrecognized \"{}\"", frame.id, group, payload),
        };
    }

    match StatusEvent::from_payload(frame.data_slice()) {
        Ok(status) => format!("0x{:03X} {:?} status {} \"{}\"", frame.id, group, status, payload),
        Err(e) => format!("0x{:03X} {:?} unrecognized \"{}\" ({})", frame.id, group, payload, e),
    }
}
