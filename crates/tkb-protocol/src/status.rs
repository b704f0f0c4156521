//! Status frames transmitted by the board.
//!
//! Every status payload is a fixed NUL-terminated ASCII string sent on the
//! board's status identifier. Decoding is the exact inverse of encoding and is
//! used by the bench tooling to follow the board's state.

use crate::constants::*;
use crate::{ProtocolError, TkbFrame, render_payload};
use std::fmt;

/// Board status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusEvent {
    /// `KRHA\0`
    HardKilled,
    /// `KRSA\0`
    SoftKilled,
    /// `KRHU\0`
    HardUnkilled,
    /// `KRSU\0`
    SoftUnkilled,
    /// `GA\0`
    GoAsserted,
    /// `GU\0`
    GoUnasserted,
}

impl StatusEvent {
    pub const ALL: [StatusEvent; 6] = [
        StatusEvent::HardKilled,
        StatusEvent::SoftKilled,
        StatusEvent::HardUnkilled,
        StatusEvent::SoftUnkilled,
        StatusEvent::GoAsserted,
        StatusEvent::GoUnasserted,
    ];

    /// Wire payload, NUL terminator included.
    pub fn payload(self) -> &'static [u8] {
        match self {
            StatusEvent::HardKilled => HARD_KILLED,
            StatusEvent::SoftKilled => SOFT_KILLED,
            StatusEvent::HardUnkilled => HARD_UNKILLED,
            StatusEvent::SoftUnkilled => SOFT_UNKILLED,
            StatusEvent::GoAsserted => GO_ASSERTED,
            StatusEvent::GoUnasserted => GO_UNASSERTED,
        }
    }

    /// Encode on the given status identifier.
    pub fn to_frame(self, status_id: u16) -> TkbFrame {
        TkbFrame::new_standard(status_id, self.payload())
    }

    /// Go status for a go-magnet level.
    pub fn go(present: bool) -> Self {
        if present {
            StatusEvent::GoAsserted
        } else {
            StatusEvent::GoUnasserted
        }
    }

    pub fn is_go(self) -> bool {
        matches!(self, StatusEvent::GoAsserted | StatusEvent::GoUnasserted)
    }

    /// Decode a status payload. The payload must match one of the fixed strings
    /// exactly, terminator and length included.
    pub fn from_payload(data: &[u8]) -> Result<Self, ProtocolError> {
        let tag = *data.get(MSG_TYPE_IDX).ok_or(ProtocolError::InvalidLength {
            expected: GO_FRAME_LEN,
            actual: 0,
        })?;

        let expected_len = match tag {
            KILL_TYPE_TAG => KILL_FRAME_LEN,
            GO_TYPE_TAG => GO_FRAME_LEN,
            other => return Err(ProtocolError::UnknownTag { tag: other }),
        };
        if data.len() != expected_len {
            return Err(ProtocolError::InvalidLength {
                expected: expected_len,
                actual: data.len(),
            });
        }

        Self::ALL
            .into_iter()
            .find(|status| status.payload() == data)
            .ok_or_else(|| ProtocolError::UnknownPayload(render_payload(data)))
    }
}

impl TryFrom<TkbFrame> for StatusEvent {
    type Error = ProtocolError;

    fn try_from(frame: TkbFrame) -> Result<Self, Self::Error> {
        Self::from_payload(frame.data_slice())
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusEvent::HardKilled => "hard killed",
            StatusEvent::SoftKilled => "soft killed",
            StatusEvent::HardUnkilled => "hard unkilled",
            StatusEvent::SoftUnkilled => "soft unkilled",
            StatusEvent::GoAsserted => "go asserted",
            StatusEvent::GoUnasserted => "go unasserted",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ID_TKB_STATUS;

    #[test]
    fn test_encode_hard_killed() {
        let frame = StatusEvent::HardKilled.to_frame(ID_TKB_STATUS);
        assert_eq!(frame.id, ID_TKB_STATUS as u32);
        assert_eq!(frame.len, 5);
        assert_eq!(frame.data_slice(), &[0x4B, 0x52, 0x48, 0x41, 0x00]);
    }

    #[test]
    fn test_encode_go_frames_are_three_bytes() {
        assert_eq!(StatusEvent::GoAsserted.to_frame(0x110).len, 3);
        assert_eq!(StatusEvent::GoUnasserted.to_frame(0x110).data_slice(), b"GU\0");
    }

    #[test]
    fn test_decode_every_status() {
        for status in StatusEvent::ALL {
            let frame = status.to_frame(0x110);
            assert_eq!(StatusEvent::try_from(frame), Ok(status));
        }
    }

    #[test]
    fn test_decode_rejects_missing_terminator() {
        assert_eq!(
            StatusEvent::from_payload(b"KRHA"),
            Err(ProtocolError::InvalidLength {
                expected: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn test_decode_rejects_command_payload() {
        // KCHA is a command, not a status
        assert!(matches!(
            StatusEvent::from_payload(b"KCHA\0"),
            Err(ProtocolError::UnknownPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_tag_and_empty() {
        assert_eq!(
            StatusEvent::from_payload(b"T\0\0"),
            Err(ProtocolError::UnknownTag { tag: b'T' })
        );
        assert!(StatusEvent::from_payload(&[]).is_err());
    }

    #[test]
    fn test_go_helper() {
        assert_eq!(StatusEvent::go(true), StatusEvent::GoAsserted);
        assert_eq!(StatusEvent::go(false), StatusEvent::GoUnasserted);
        assert!(StatusEvent::GoAsserted.is_go());
        assert!(!StatusEvent::SoftKilled.is_go());
    }
}
