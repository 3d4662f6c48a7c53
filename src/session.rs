//! Per-connection protocol state machine.
//!
//! [`Session`] owns everything the protocol remembers between datagrams:
//! the handshake progress, the session id, and the per-mix-effect tally
//! maps. It performs no IO; the driver task feeds it raw datagrams and
//! transmits whatever reply it hands back. Only that task ever touches a
//! `Session`, which is what makes the state lock-free.

use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::error::Result;
use crate::protocol::{CommandFrame, CommandFrames, PacketFlags, TransportPacket, names};
use crate::types::{SwitcherEvent, TallyState};

/// Outcome of processing one datagram: an optional packet to transmit and
/// the notifications the datagram produced, in emission order.
#[derive(Debug, Default)]
pub(crate) struct Step {
    pub reply: Option<TransportPacket>,
    pub events: Vec<SwitcherEvent>,
}

impl Step {
    fn idle() -> Self {
        Self::default()
    }
}

/// Protocol state for one UDP session with a switcher.
#[derive(Debug)]
pub(crate) struct Session {
    session_id: u16,
    remote_package_id: u16,
    /// Sequence number for packets this side sends. Starts at 1 and is never
    /// reset for the lifetime of the session.
    local_package_id: u16,
    established: bool,
    program: HashMap<u16, u16>,
    preview: HashMap<u16, u16>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: 0,
            remote_package_id: 0,
            local_package_id: 1,
            established: false,
            program: HashMap::new(),
            preview: HashMap::new(),
        }
    }

    /// The packet that opens the handshake, sent once when the socket is up.
    pub fn handshake_packet(&self) -> TransportPacket {
        TransportPacket::handshake()
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Sequence number of the newest state-carrying packet from the switcher.
    pub fn remote_package_id(&self) -> u16 {
        self.remote_package_id
    }

    pub fn program_input(&self, mix_effect: u16) -> Option<u16> {
        self.program.get(&mix_effect).copied()
    }

    pub fn preview_input(&self, mix_effect: u16) -> Option<u16> {
        self.preview.get(&mix_effect).copied()
    }

    /// Clone the current tally state for publication outside the task.
    pub fn snapshot(&self) -> TallyState {
        TallyState {
            session_id: self.session_id,
            established: self.established,
            program: self.program.clone(),
            preview: self.preview.clone(),
        }
    }

    /// Process one received datagram.
    ///
    /// Decode failures bubble up so the driver can log and drop the
    /// datagram; every other irregularity is absorbed here.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<Step> {
        let packet = TransportPacket::decode(datagram)?;

        // Handshake answer: adopt the session id and acknowledge. The
        // session is not established yet; that waits for the first packet
        // that actually carries state.
        if packet.flags.has_flag(PacketFlags::HELLO) {
            self.session_id = packet.session_id;
            debug!(session_id = self.session_id, "handshake answered");
            return Ok(Step { reply: Some(self.ack_for(&packet)), events: Vec::new() });
        }

        // Bare acknowledgment of something we sent. Nothing to do; lost
        // acknowledgments are never retransmitted either way.
        if packet.flags.has_flag(PacketFlags::ACK) && packet.payload.is_empty() {
            trace!(acknowledged = packet.acknowledgment, "ack received");
            return Ok(Step::idle());
        }

        if packet.payload.is_empty() {
            return Ok(Step::idle());
        }

        self.remote_package_id = packet.package_id;

        let mut events = Vec::new();
        if !self.established {
            self.established = true;
            events.push(SwitcherEvent::Connected);
            info!(session_id = self.session_id, "session established");
        }

        for frame in CommandFrames::new(&packet.payload) {
            self.dispatch(&frame, &mut events);
        }

        Ok(Step { reply: Some(self.ack_for(&packet)), events })
    }

    fn ack_for(&self, packet: &TransportPacket) -> TransportPacket {
        TransportPacket::ack(self.session_id, packet.package_id, self.local_package_id)
    }

    fn dispatch(&mut self, frame: &CommandFrame<'_>, events: &mut Vec<SwitcherEvent>) {
        match frame.name {
            names::PROGRAM_INPUT => {
                let Some((mix_effect, input)) = decode_bus_assignment(frame.data) else {
                    trace!(len = frame.data.len(), "short program-input frame ignored");
                    return;
                };
                // Edge-triggered: store always, notify only on change.
                if self.program.insert(mix_effect, input) != Some(input) {
                    debug!(mix_effect, input, "program input changed");
                    events.push(SwitcherEvent::ProgramInputChanged { mix_effect, input });
                }
            }
            names::PREVIEW_INPUT => {
                let Some((mix_effect, input)) = decode_bus_assignment(frame.data) else {
                    trace!(len = frame.data.len(), "short preview-input frame ignored");
                    return;
                };
                if self.preview.insert(mix_effect, input) != Some(input) {
                    debug!(mix_effect, input, "preview input changed");
                    events.push(SwitcherEvent::PreviewInputChanged { mix_effect, input });
                }
            }
            names::PRODUCT_ID => {
                let product = String::from_utf8_lossy(frame.data);
                let product = product.trim_end_matches('\0');
                info!(product, "switcher identified");
            }
            _ => {
                trace!(command = frame.name(), "unhandled command frame");
            }
        }
    }
}

/// Mix-effect index and input id carried by program/preview frames.
fn decode_bus_assignment(data: &[u8]) -> Option<(u16, u16)> {
    if data.len() < 4 {
        return None;
    }
    let mix_effect = u16::from_be_bytes([data[0], data[1]]);
    let input = u16::from_be_bytes([data[2], data[3]]);
    Some((mix_effect, input))
}
