//! Command frames received by the board.
//!
//! The type tag at offset 0 classifies a frame: `'K'` carries one of four kill
//! commands, `'T'` carries a thrust setpoint for one thruster. Everything else,
//! including short payloads, decodes to [`Command::Unrecognized`].
//!
//! Encoding (mothership side) is provided for the bench tooling and tests.

use crate::constants::*;
use crate::{ProtocolError, TkbFrame, bytes_to_i16_be, i16_to_bytes_be, render_payload};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Kill protocol request from the mothership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KillCommand {
    /// `KCHA\0`
    HardKill,
    /// `KCSA\0`
    SoftKill,
    /// `KCHU\0`
    HardUnkill,
    /// `KCSU\0`
    SoftUnkill,
}

impl KillCommand {
    pub const ALL: [KillCommand; 4] = [
        KillCommand::HardKill,
        KillCommand::SoftKill,
        KillCommand::HardUnkill,
        KillCommand::SoftUnkill,
    ];

    pub fn payload(self) -> &'static [u8; KILL_FRAME_LEN] {
        match self {
            KillCommand::HardKill => HARD_KILL_CMD,
            KillCommand::SoftKill => SOFT_KILL_CMD,
            KillCommand::HardUnkill => HARD_UNKILL_CMD,
            KillCommand::SoftUnkill => SOFT_UNKILL_CMD,
        }
    }

    pub fn to_frame(self, id: u16) -> TkbFrame {
        TkbFrame::new_standard(id, self.payload())
    }

    /// Match the first five bytes against the kill command strings. Bytes past
    /// the terminator are ignored.
    pub fn from_payload(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < KILL_FRAME_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: KILL_FRAME_LEN,
                actual: data.len(),
            });
        }
        let head = &data[..KILL_FRAME_LEN];
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.payload() == head)
            .ok_or_else(|| ProtocolError::UnknownPayload(render_payload(head)))
    }
}

impl fmt::Display for KillCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KillCommand::HardKill => "hard kill",
            KillCommand::SoftKill => "soft kill",
            KillCommand::HardUnkill => "hard unkill",
            KillCommand::SoftUnkill => "soft unkill",
        };
        f.write_str(name)
    }
}

/// One of the eight thrusters, numbered as on the wire.
///
/// Front/back × horizontal/vertical × left/right.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ThrusterId {
    FrontHorizontalLeft = 0,
    FrontHorizontalRight = 1,
    FrontVerticalLeft = 2,
    FrontVerticalRight = 3,
    BackHorizontalLeft = 4,
    BackHorizontalRight = 5,
    BackVerticalLeft = 6,
    BackVerticalRight = 7,
}

impl ThrusterId {
    pub const COUNT: usize = 8;

    pub const ALL: [ThrusterId; Self::COUNT] = [
        ThrusterId::FrontHorizontalLeft,
        ThrusterId::FrontHorizontalRight,
        ThrusterId::FrontVerticalLeft,
        ThrusterId::FrontVerticalRight,
        ThrusterId::BackHorizontalLeft,
        ThrusterId::BackHorizontalRight,
        ThrusterId::BackVerticalLeft,
        ThrusterId::BackVerticalRight,
    ];

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    /// Three-letter name used on the bench (`FHL`, `BVR`, ...).
    pub fn short_name(self) -> &'static str {
        match self {
            ThrusterId::FrontHorizontalLeft => "FHL",
            ThrusterId::FrontHorizontalRight => "FHR",
            ThrusterId::FrontVerticalLeft => "FVL",
            ThrusterId::FrontVerticalRight => "FVR",
            ThrusterId::BackHorizontalLeft => "BHL",
            ThrusterId::BackHorizontalRight => "BHR",
            ThrusterId::BackVerticalLeft => "BVL",
            ThrusterId::BackVerticalRight => "BVR",
        }
    }

    /// Parse a short name (case-insensitive) or a wire index.
    pub fn from_short_name(name: &str) -> Option<Self> {
        if let Ok(index) = name.parse::<u8>() {
            return Self::try_from(index).ok();
        }
        Self::ALL
            .into_iter()
            .find(|id| id.short_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ThrusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Normalized thrust setpoint for one thruster, `speed ∈ [-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrustCommand {
    pub channel: ThrusterId,
    pub speed: f32,
}

impl ThrustCommand {
    pub fn new(channel: ThrusterId, speed: f32) -> Self {
        Self { channel, speed }
    }
}

/// Full thrust frame, including the three opaque trailer bytes (CR, HS, UA).
///
/// | Offset | Field |
/// |---|---|
/// | 0 | `'T'` |
/// | 1 | thruster index 0-7 |
/// | 2-3 | speed, i16 big-endian Q15 |
/// | 4 | CR |
/// | 5 | HS |
/// | 6 | UA |
/// | 7 | reserved |
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrustFrame {
    pub thruster: ThrusterId,
    pub speed: f32,
    pub cr: u8,
    pub hs: u8,
    pub ua: u8,
}

impl ThrustFrame {
    pub fn new(thruster: ThrusterId, speed: f32) -> Self {
        Self {
            thruster,
            speed,
            cr: 0,
            hs: 0,
            ua: 0,
        }
    }

    pub fn command(&self) -> ThrustCommand {
        ThrustCommand::new(self.thruster, self.speed)
    }

    pub fn to_frame(&self, id: u16) -> TkbFrame {
        let mut data = [0u8; THRUST_FRAME_LEN];
        data[MSG_TYPE_IDX] = THRUST_TYPE_TAG;
        data[THRUST_CHANNEL_IDX] = self.thruster.into();
        data[THRUST_SPEED_IDX..THRUST_SPEED_IDX + 2]
            .copy_from_slice(&i16_to_bytes_be(speed_to_q15(self.speed)));
        data[MSG_CR_IDX] = self.cr;
        data[MSG_HS_IDX] = self.hs;
        data[MSG_UA_IDX] = self.ua;
        TkbFrame::new_standard(id, &data)
    }
}

impl TryFrom<TkbFrame> for ThrustFrame {
    type Error = ProtocolError;

    fn try_from(frame: TkbFrame) -> Result<Self, Self::Error> {
        let data = frame.data_slice();
        if data.len() < THRUST_FRAME_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: THRUST_FRAME_LEN,
                actual: data.len(),
            });
        }
        if data[MSG_TYPE_IDX] != THRUST_TYPE_TAG {
            return Err(ProtocolError::UnknownTag {
                tag: data[MSG_TYPE_IDX],
            });
        }

        let raw_thruster = data[THRUST_CHANNEL_IDX];
        let thruster =
            ThrusterId::try_from(raw_thruster).map_err(|_| ProtocolError::InvalidValue {
                field: "thruster".to_string(),
                value: raw_thruster,
            })?;
        let raw_speed = bytes_to_i16_be([data[THRUST_SPEED_IDX], data[THRUST_SPEED_IDX + 1]]);

        Ok(Self {
            thruster,
            speed: q15_to_speed(raw_speed),
            cr: data[MSG_CR_IDX],
            hs: data[MSG_HS_IDX],
            ua: data[MSG_UA_IDX],
        })
    }
}

/// Normalized speed to Q15. NaN encodes as 0, out-of-range values saturate.
pub fn speed_to_q15(speed: f32) -> i16 {
    if speed.is_nan() {
        return 0;
    }
    (speed.clamp(-1.0, 1.0) * Q15_SCALE).round() as i16
}

/// Q15 to normalized speed. `-32768` clamps to `-1.0`.
pub fn q15_to_speed(raw: i16) -> f32 {
    (raw as f32 / Q15_SCALE).max(-1.0)
}

/// Decoded inbound frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Kill(KillCommand),
    Thrust(ThrustFrame),
    /// Unknown tag, unknown kill string, bad thruster index or short payload
    Unrecognized,
}

impl Command {
    /// Classify and decode a frame. Never fails: anything that is not a valid
    /// kill or thrust command becomes `Unrecognized`.
    pub fn decode(frame: &TkbFrame) -> Self {
        Self::parse(frame).unwrap_or(Command::Unrecognized)
    }

    /// Like [`Command::decode`], but keeps the reason a frame was rejected.
    pub fn parse(frame: &TkbFrame) -> Result<Self, ProtocolError> {
        match frame.type_tag() {
            Some(KILL_TYPE_TAG) => KillCommand::from_payload(frame.data_slice()).map(Command::Kill),
            Some(THRUST_TYPE_TAG) => ThrustFrame::try_from(*frame).map(Command::Thrust),
            Some(tag) => Err(ProtocolError::UnknownTag { tag }),
            None => Err(ProtocolError::InvalidLength {
                expected: 1,
                actual: 0,
            }),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Command::Unrecognized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ID_KILL_COMMAND, ID_THRUST_COMMAND};

    #[test]
    fn test_decode_kill_commands() {
        let cases = [
            (b"KCHA\0", KillCommand::HardKill),
            (b"KCSA\0", KillCommand::SoftKill),
            (b"KCHU\0", KillCommand::HardUnkill),
            (b"KCSU\0", KillCommand::SoftUnkill),
        ];
        for (payload, expected) in cases {
            let frame = TkbFrame::new_standard(ID_KILL_COMMAND, payload);
            assert_eq!(Command::decode(&frame), Command::Kill(expected));
        }
    }

    #[test]
    fn test_decode_kill_ignores_bytes_after_terminator() {
        let frame = TkbFrame::new_standard(ID_KILL_COMMAND, b"KCSA\0xyz");
        assert_eq!(Command::decode(&frame), Command::Kill(KillCommand::SoftKill));
    }

    #[test]
    fn test_decode_unknown_kill_string() {
        let frame = TkbFrame::new_standard(ID_KILL_COMMAND, b"KCXX\0");
        assert_eq!(Command::decode(&frame), Command::Unrecognized);
        // status strings are not commands
        let frame = TkbFrame::new_standard(ID_KILL_COMMAND, b"KRHA\0");
        assert_eq!(Command::decode(&frame), Command::Unrecognized);
    }

    #[test]
    fn test_decode_short_payloads() {
        for payload in [&b""[..], &b"K"[..], &b"KCHA"[..], &b"T\x00\x7F\xFF"[..]] {
            let frame = TkbFrame::new_standard(ID_KILL_COMMAND, payload);
            assert_eq!(Command::decode(&frame), Command::Unrecognized);
        }
    }

    #[test]
    fn test_decode_unknown_tag() {
        let frame = TkbFrame::new_standard(ID_KILL_COMMAND, b"GA\0");
        assert_eq!(
            Command::parse(&frame),
            Err(ProtocolError::UnknownTag { tag: b'G' })
        );
        assert!(!Command::decode(&frame).is_recognized());
    }

    #[test]
    fn test_decode_thrust_full_forward() {
        let frame = TkbFrame::new_standard(
            ID_THRUST_COMMAND,
            &[b'T', 0, 0x7F, 0xFF, 0x11, 0x22, 0x33, 0xEE],
        );
        match Command::decode(&frame) {
            Command::Thrust(thrust) => {
                assert_eq!(thrust.thruster, ThrusterId::FrontHorizontalLeft);
                assert_eq!(thrust.speed, 1.0);
                assert_eq!((thrust.cr, thrust.hs, thrust.ua), (0x11, 0x22, 0x33));
            },
            other => panic!("expected thrust, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_thrust_most_negative_clamps() {
        let frame = TkbFrame::new_standard(ID_THRUST_COMMAND, &[b'T', 7, 0x80, 0x00, 0, 0, 0, 0]);
        let thrust = ThrustFrame::try_from(frame).unwrap();
        assert_eq!(thrust.thruster, ThrusterId::BackVerticalRight);
        assert_eq!(thrust.speed, -1.0);
    }

    #[test]
    fn test_decode_thrust_bad_index() {
        let frame = TkbFrame::new_standard(ID_THRUST_COMMAND, &[b'T', 8, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            ThrustFrame::try_from(frame),
            Err(ProtocolError::InvalidValue {
                field: "thruster".to_string(),
                value: 8
            })
        );
        assert_eq!(Command::decode(&frame), Command::Unrecognized);
    }

    #[test]
    fn test_encode_thrust_layout() {
        let mut thrust = ThrustFrame::new(ThrusterId::FrontVerticalRight, -0.5);
        thrust.cr = 1;
        thrust.hs = 2;
        thrust.ua = 3;
        let frame = thrust.to_frame(ID_THRUST_COMMAND);
        // -0.5 * 32767 = -16383.5 -> -16384 = 0xC000
        assert_eq!(frame.data_slice(), &[b'T', 3, 0xC0, 0x00, 1, 2, 3, 0]);
    }

    #[test]
    fn test_speed_to_q15_edges() {
        assert_eq!(speed_to_q15(0.0), 0);
        assert_eq!(speed_to_q15(1.0), 32767);
        assert_eq!(speed_to_q15(-1.0), -32767);
        assert_eq!(speed_to_q15(3.0), 32767);
        assert_eq!(speed_to_q15(f32::NAN), 0);
    }

    #[test]
    fn test_thruster_names() {
        assert_eq!(ThrusterId::from_short_name("fhl"), Some(ThrusterId::FrontHorizontalLeft));
        assert_eq!(ThrusterId::from_short_name("BVR"), Some(ThrusterId::BackVerticalRight));
        assert_eq!(ThrusterId::from_short_name("5"), Some(ThrusterId::BackHorizontalRight));
        assert_eq!(ThrusterId::from_short_name("9"), None);
        assert_eq!(ThrusterId::from_short_name("XYZ"), None);
        for (i, id) in ThrusterId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_kill_command_round_trip() {
        for cmd in KillCommand::ALL {
            let frame = cmd.to_frame(ID_KILL_COMMAND);
            assert_eq!(Command::decode(&frame), Command::Kill(cmd));
        }
    }
}
