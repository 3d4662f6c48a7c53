//! Transport packet layout for the switcher's UDP control protocol.
//!
//! Every UDP datagram exchanged with the switcher carries exactly one
//! transport packet. The header layout, all fields big-endian:
//!
//! ```text
//! offset  0  flags            (1 byte)
//! offset  1  reserved         (1 byte, zero)
//! offset  2  length           (u16)
//! offset  4  session id       (u16)
//! offset  6  acknowledgment   (u16)
//! offset  8  reserved         (2 bytes, zero)
//! offset 10  package id       (u16)
//! offset 12  reserved         (2 bytes, zero, outbound only)
//! ```
//!
//! Outbound packets are written with a 14-byte header; inbound parsing takes
//! the payload from offset 12 onward. Real units accept both layouts, so the
//! asymmetry is kept exactly as observed on the wire rather than reconciled.
//! The `length` field is written as the 12-byte header length plus payload
//! and is never validated against the actual datagram size on decode.

use serde::{Deserialize, Serialize};

use super::flags::PacketFlags;
use crate::error::{Result, SwitcherError};

/// Size of the header written in front of outbound payloads.
pub const WIRE_HEADER_LEN: usize = 14;

/// Minimum datagram size accepted by [`TransportPacket::decode`]; inbound
/// payloads start at this offset.
pub const MIN_DATAGRAM_LEN: usize = 12;

/// Fixed greeting payload the switcher expects in the first handshake packet.
/// Opaque version/type marker; the literal bytes matter.
pub const HANDSHAKE_GREETING: [u8; 8] = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// One UDP datagram's logical content.
///
/// Constructed per send/receive event and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportPacket {
    /// Flag bits, see [`PacketFlags`].
    pub flags: PacketFlags,
    /// Declared total packet size (12-byte header + payload).
    pub length: u16,
    /// Session id assigned by the switcher during handshake; 0 before that.
    pub session_id: u16,
    /// Package id being acknowledged; meaningful only when `ACK` is set.
    pub acknowledgment: u16,
    /// Per-sender sequence number.
    pub package_id: u16,
    /// Zero or more command frames; empty for handshake/ack-only packets.
    pub payload: Vec<u8>,
}

impl TransportPacket {
    /// Build the initial handshake packet sent right after the socket opens.
    pub fn handshake() -> Self {
        Self {
            flags: PacketFlags::new(PacketFlags::CONNECT | PacketFlags::HELLO),
            length: (MIN_DATAGRAM_LEN + HANDSHAKE_GREETING.len()) as u16,
            session_id: 0,
            acknowledgment: 0,
            package_id: 0,
            payload: HANDSHAKE_GREETING.to_vec(),
        }
    }

    /// Build an empty acknowledgment for a received package id.
    pub fn ack(session_id: u16, acknowledged: u16, package_id: u16) -> Self {
        Self {
            flags: PacketFlags::new(PacketFlags::ACK),
            length: MIN_DATAGRAM_LEN as u16,
            session_id,
            acknowledgment: acknowledged,
            package_id,
            payload: Vec::new(),
        }
    }

    /// Serialize into wire bytes (14-byte header followed by the payload).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WIRE_HEADER_LEN + self.payload.len());
        buf.push(self.flags.value());
        buf.push(0x00);
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.extend_from_slice(&self.session_id.to_be_bytes());
        buf.extend_from_slice(&self.acknowledgment.to_be_bytes());
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&self.package_id.to_be_bytes());
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a received datagram.
    ///
    /// Requires at least [`MIN_DATAGRAM_LEN`] bytes; no other header field is
    /// validated or checksummed.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_DATAGRAM_LEN {
            return Err(SwitcherError::malformed_packet(format!(
                "datagram too short: {} bytes, need at least {MIN_DATAGRAM_LEN}",
                data.len()
            )));
        }

        let read_u16 = |at: usize| u16::from_be_bytes([data[at], data[at + 1]]);

        Ok(Self {
            flags: PacketFlags::new(data[0]),
            length: read_u16(2),
            session_id: read_u16(4),
            acknowledgment: read_u16(6),
            package_id: read_u16(10),
            payload: data[MIN_DATAGRAM_LEN..].to_vec(),
        })
    }
}
