//! Packet flag bits for the switcher transport header

use serde::{Deserialize, Serialize};

/// Flag byte carried in the first octet of every transport packet.
///
/// Flags are independent bits and may be combined; the initial handshake
/// packet carries `CONNECT | HELLO`, acknowledgments carry `ACK`, and state
/// dumps from the switcher typically carry `RESPONSE` (sometimes together
/// with `ACK`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketFlags(pub u8);

impl PacketFlags {
    /// Client is requesting a new session.
    pub const CONNECT: u8 = 0x10;
    /// Handshake greeting (client) or handshake answer (switcher).
    pub const HELLO: u8 = 0x02;
    /// The `acknowledgment` header field is meaningful.
    pub const ACK: u8 = 0x80;
    /// The packet is a retransmission.
    pub const RETRANSMIT: u8 = 0x20;
    /// The packet answers an earlier request.
    pub const RESPONSE: u8 = 0x08;

    /// Create a new flag set from a raw flag byte.
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if a specific flag bit is set using a bitmask.
    pub fn has_flag(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Get the raw flag byte.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr<u8> for PacketFlags {
    type Output = PacketFlags;

    fn bitor(self, rhs: u8) -> PacketFlags {
        PacketFlags(self.0 | rhs)
    }
}
