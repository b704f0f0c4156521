//! Protocol constants: type tags, payload offsets and the fixed ASCII payloads.
//!
//! Kill and go payloads are NUL-terminated ASCII strings; the terminator is part
//! of the frame (kill frames are 5 bytes, go frames 3 bytes).

/// Offset of the type tag in every payload
pub const MSG_TYPE_IDX: usize = 0;

/// Kill command/status type tag
pub const KILL_TYPE_TAG: u8 = b'K';
/// Thrust command type tag
pub const THRUST_TYPE_TAG: u8 = b'T';
/// Go status type tag
pub const GO_TYPE_TAG: u8 = b'G';

pub const KILL_FRAME_LEN: usize = 5;
pub const GO_FRAME_LEN: usize = 3;
pub const THRUST_FRAME_LEN: usize = 8;

// ============================================================================
// Thrust frame offsets
// ============================================================================

pub const THRUST_CHANNEL_IDX: usize = 1;
/// Big-endian Q15 speed, bytes 2..4
pub const THRUST_SPEED_IDX: usize = 2;
pub const MSG_CR_IDX: usize = 4;
pub const MSG_HS_IDX: usize = 5;
pub const MSG_UA_IDX: usize = 6;
pub const THRUST_RESERVED_IDX: usize = 7;

/// Q15 full scale: ±32767 ↔ ±1.0
pub const Q15_SCALE: f32 = 32767.0;

// ============================================================================
// Status payloads (board → mothership)
// ============================================================================

pub const HARD_KILLED: &[u8; KILL_FRAME_LEN] = b"KRHA\0";
pub const SOFT_KILLED: &[u8; KILL_FRAME_LEN] = b"KRSA\0";
pub const HARD_UNKILLED: &[u8; KILL_FRAME_LEN] = b"KRHU\0";
pub const SOFT_UNKILLED: &[u8; KILL_FRAME_LEN] = b"KRSU\0";
pub const GO_ASSERTED: &[u8; GO_FRAME_LEN] = b"GA\0";
pub const GO_UNASSERTED: &[u8; GO_FRAME_LEN] = b"GU\0";

// ============================================================================
// Kill command payloads (mothership → board)
// ============================================================================

pub const HARD_KILL_CMD: &[u8; KILL_FRAME_LEN] = b"KCHA\0";
pub const SOFT_KILL_CMD: &[u8; KILL_FRAME_LEN] = b"KCSA\0";
pub const HARD_UNKILL_CMD: &[u8; KILL_FRAME_LEN] = b"KCHU\0";
pub const SOFT_UNKILL_CMD: &[u8; KILL_FRAME_LEN] = b"KCSU\0";
