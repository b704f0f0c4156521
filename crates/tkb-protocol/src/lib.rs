//! # TKB Protocol
//!
//! Thruster Kill Board CAN protocol definitions, free of any hardware dependency.
//!
//! ## Modules
//!
//! - `ids`: CAN identifiers and the command-group acceptance filter
//! - `constants`: type tags, payload offsets and fixed payloads
//! - `status`: status frames transmitted by the board (`KR??`, `G?`)
//! - `command`: command frames received by the board (`KC??`, `T`)
//!
//! ## Byte order
//!
//! Multi-byte fields (the thrust speed) are big-endian.

pub mod command;
pub mod constants;
pub mod ids;
pub mod status;

use thiserror::Error;

pub use command::*;
pub use constants::*;
pub use ids::*;
pub use status::*;

/// A classic CAN 2.0 frame as seen by the protocol layer.
///
/// `TkbFrame` sits between the codec and the CAN adapters so that neither side
/// depends on the other's frame representation. It is `Copy`, fixed-size and
/// carries no lifetimes.
///
/// ```rust
/// use tkb_protocol::TkbFrame;
///
/// let frame = TkbFrame::new_standard(0x110, b"KRHA\0");
/// assert_eq!(frame.id(), 0x110);
/// assert_eq!(frame.data_slice(), b"KRHA\0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TkbFrame {
    /// CAN identifier (11-bit standard or 29-bit extended)
    pub id: u32,

    /// Payload, zero-padded past `len`
    pub data: [u8; 8],

    /// Valid payload length (0-8)
    pub len: u8,

    /// Whether `id` is a 29-bit identifier
    pub is_extended: bool,

    /// Receive timestamp in microseconds, 0 when unavailable
    pub timestamp_us: u64,
}

impl TkbFrame {
    /// Build a standard (11-bit) frame. Payloads longer than 8 bytes are truncated.
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// Build an extended (29-bit) frame.
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// The valid part of the payload.
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..(self.len as usize).min(8)]
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }

    /// Type tag (byte 0), if the frame has a payload at all.
    pub fn type_tag(&self) -> Option<u8> {
        self.data_slice().get(MSG_TYPE_IDX).copied()
    }
}

/// Protocol parse errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unknown type tag: 0x{tag:02X}")]
    UnknownTag { tag: u8 },

    #[error("Unknown payload: {0}")]
    UnknownPayload(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

/// Big-endian bytes to i16.
pub fn bytes_to_i16_be(bytes: [u8; 2]) -> i16 {
    i16::from_be_bytes(bytes)
}

/// i16 to big-endian bytes.
pub fn i16_to_bytes_be(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Human-readable rendering of a payload: printable ASCII as-is, everything else
/// as `\xNN`. Used for log lines and the bench CLI.
pub fn render_payload(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for &b in data {
        if b.is_ascii_graphic() || b == b' ' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02X}", b));
        }
    }
    out
}
