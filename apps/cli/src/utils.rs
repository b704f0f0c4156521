//! Argument parsing and frame formatting shared by the commands.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use tkb_protocol::{KillCommand, MAX_STANDARD_ID, StatusEvent, ThrusterId, TkbFrame};

/// Kill command names on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KillArg {
    HardKill,
    SoftKill,
    HardUnkill,
    SoftUnkill,
}

impl From<KillArg> for KillCommand {
    fn from(arg: KillArg) -> Self {
        match arg {
            KillArg::HardKill => KillCommand::HardKill,
            KillArg::SoftKill => KillCommand::SoftKill,
            KillArg::HardUnkill => KillCommand::HardUnkill,
            KillArg::SoftUnkill => KillCommand::SoftUnkill,
        }
    }
}

/// Status names on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    HardKilled,
    SoftKilled,
    HardUnkilled,
    SoftUnkilled,
    GoAsserted,
    GoUnasserted,
}

impl From<StatusArg> for StatusEvent {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::HardKilled => StatusEvent::HardKilled,
            StatusArg::SoftKilled => StatusEvent::SoftKilled,
            StatusArg::HardUnkilled => StatusEvent::HardUnkilled,
            StatusArg::SoftUnkilled => StatusEvent::SoftUnkilled,
            StatusArg::GoAsserted => StatusEvent::GoAsserted,
            StatusArg::GoUnasserted => StatusEvent::GoUnasserted,
        }
    }
}

/// 11-bit identifier, `0x`-prefixed hex or decimal.
pub fn parse_can_id(text: &str) -> Result<u16, String> {
    let text = text.trim();
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    }
    .map_err(|e| format!("invalid CAN id '{}': {}", text, e))?;

    if value > MAX_STANDARD_ID {
        return Err(format!("CAN id 0x{:X} exceeds 0x{:X}", value, MAX_STANDARD_ID));
    }
    Ok(value as u16)
}

/// Thruster by short name (`FHL`) or wire index (`0`).
pub fn parse_thruster(text: &str) -> Result<ThrusterId, String> {
    ThrusterId::from_short_name(text).ok_or_else(|| {
        let names: Vec<_> = ThrusterId::ALL.iter().map(|t| t.short_name()).collect();
        format!("unknown thruster '{}', expected one of {} or 0-7", text, names.join(", "))
    })
}

/// Normalized speed in `[-1, 1]`.
pub fn parse_speed(text: &str) -> Result<f32, String> {
    let speed: f32 = text
        .trim()
        .parse()
        .map_err(|e| format!("invalid speed '{}': {}", text, e))?;
    if !speed.is_finite() || !(-1.0..=1.0).contains(&speed) {
        return Err(format!("speed {} is outside [-1, 1]", speed));
    }
    Ok(speed)
}

/// `PAYLOAD` or `ID#PAYLOAD` (candump notation). Spaces are ignored.
pub fn parse_frame_arg(text: &str, default_id: u16) -> Result<TkbFrame> {
    let (id, payload) = match text.split_once('#') {
        Some((id, payload)) => {
            let id = u16::from_str_radix(id.trim(), 16)
                .with_context(|| format!("invalid CAN id '{}'", id))?;
            (id, payload)
        },
        None => (default_id, text),
    };
    if id as u32 > MAX_STANDARD_ID {
        bail!("CAN id 0x{:X} exceeds 0x{:X}", id, MAX_STANDARD_ID);
    }

    let cleaned: String = payload
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = hex::decode(&cleaned).with_context(|| format!("invalid hex payload '{}'", payload))?;
    if bytes.len() > 8 {
        bail!("payload is {} bytes, a CAN frame holds at most 8", bytes.len());
    }
    Ok(TkbFrame::new_standard(id, &bytes))
}

/// candump notation: `110#4B52484100`.
pub fn format_frame(frame: &TkbFrame) -> String {
    format!(
        "{:03X}#{}",
        frame.id,
        hex::encode_upper(frame.data_slice())
    )
}
