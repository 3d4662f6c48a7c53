//! Wire protocol primitives: transport packets and command frames.
//!
//! This module is pure data transformation: no sockets, no state. The
//! session layer drives it from the receive path.

mod command;
mod flags;
mod packet;

pub use command::{CommandFrame, CommandFrames, FRAME_HEADER_LEN, names};
pub use flags::PacketFlags;
pub use packet::{HANDSHAKE_GREETING, MIN_DATAGRAM_LEN, TransportPacket, WIRE_HEADER_LEN};
