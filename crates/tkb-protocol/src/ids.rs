//! CAN identifiers and the command-group acceptance filter.
//!
//! The board listens to one command group, selected by an id/mask pair the same
//! way a CAN controller's message object filters, and transmits every status
//! frame on a single status identifier.

/// Default status identifier (board → mothership)
pub const ID_TKB_STATUS: u16 = 0x110;

/// Default command group: `0x100..=0x10F`
pub const COMMAND_GROUP_ID: u32 = 0x100;
pub const COMMAND_GROUP_MASK: u32 = 0x7F0;

/// Identifier the bench tooling uses for kill commands
pub const ID_KILL_COMMAND: u16 = 0x100;
/// Identifier the bench tooling uses for thrust commands
pub const ID_THRUST_COMMAND: u16 = 0x101;

/// Largest 11-bit identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Id/mask acceptance filter: a frame is accepted when
/// `frame_id & mask == id & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AcceptanceFilter {
    pub id: u32,
    pub mask: u32,
}

impl AcceptanceFilter {
    pub const fn new(id: u32, mask: u32) -> Self {
        Self { id, mask }
    }

    /// Filter matching exactly one identifier.
    pub const fn exact(id: u32) -> Self {
        Self {
            id,
            mask: MAX_STANDARD_ID,
        }
    }

    pub fn matches(&self, frame_id: u32) -> bool {
        frame_id & self.mask == self.id & self.mask
    }
}

impl Default for AcceptanceFilter {
    fn default() -> Self {
        Self::new(COMMAND_GROUP_ID, COMMAND_GROUP_MASK)
    }
}

/// Coarse classification of an identifier against the default layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameGroup {
    /// Inbound commands
    Command,
    /// Outbound board status
    Status,
    Unknown,
}

impl FrameGroup {
    pub fn from_id(id: u32) -> Self {
        if id == ID_TKB_STATUS as u32 {
            FrameGroup::Status
        } else if AcceptanceFilter::default().matches(id) {
            FrameGroup::Command
        } else {
            FrameGroup::Unknown
        }
    }
}
