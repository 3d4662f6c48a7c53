//! Integration tests for the connection layer
//!
//! These tests drive real UDP loopback sockets: a mock switcher task
//! answers the handshake and pushes tally state, and the tests assert the
//! connection's observable behavior: events, queries, and the packets
//! that actually hit the wire.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::info;

use super::SwitcherConnection;
use crate::discovery::DeviceProber;
use crate::error::SwitcherError;
use crate::protocol::{
    FRAME_HEADER_LEN, HANDSHAKE_GREETING, MIN_DATAGRAM_LEN, PacketFlags, TransportPacket, names,
};
use crate::types::SwitcherEvent;

/// Serialize a packet the way a switcher does: 12-byte header, payload
/// directly after it.
fn switcher_wire_bytes(packet: &TransportPacket) -> Vec<u8> {
    let mut datagram = packet.encode()[..MIN_DATAGRAM_LEN].to_vec();
    datagram.extend_from_slice(&packet.payload);
    datagram
}

fn frame_bytes(name: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&((FRAME_HEADER_LEN + data.len()) as u16).to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]);
    buf.extend_from_slice(name);
    buf.extend_from_slice(data);
    buf
}

fn bus_frame(name: &[u8; 4], mix_effect: u16, input: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&mix_effect.to_be_bytes());
    data.extend_from_slice(&input.to_be_bytes());
    frame_bytes(name, &data)
}

fn data_packet(session_id: u16, package_id: u16, payload: Vec<u8>) -> TransportPacket {
    TransportPacket {
        flags: PacketFlags::new(PacketFlags::RESPONSE),
        length: (MIN_DATAGRAM_LEN + payload.len()) as u16,
        session_id,
        acknowledgment: 0,
        package_id,
        payload,
    }
}

/// Scripted switcher on a loopback socket.
///
/// Answers the first handshake with a HELLO carrying session id 7, follows
/// up with an initial state dump (program 3 / preview 5 on ME 0), and after
/// the client acknowledges that dump, pushes one program change to input 8.
/// Every decodable inbound packet is forwarded for assertions.
struct MockSwitcher {
    addr: SocketAddr,
    inbound: mpsc::UnboundedReceiver<TransportPacket>,
}

const MOCK_SESSION_ID: u16 = 7;

impl MockSwitcher {
    async fn spawn() -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            let mut update_sent = false;
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(packet) = TransportPacket::decode(&buf[..len]) else {
                    continue;
                };

                let is_handshake = packet.flags.has_flag(PacketFlags::CONNECT);
                let acknowledges_dump = packet.flags.has_flag(PacketFlags::ACK)
                    && packet.acknowledgment == 1
                    && packet.payload.is_empty();
                let _ = inbound_tx.send(packet);

                if is_handshake {
                    let hello = TransportPacket {
                        flags: PacketFlags::new(PacketFlags::HELLO),
                        length: MIN_DATAGRAM_LEN as u16,
                        session_id: MOCK_SESSION_ID,
                        acknowledgment: 0,
                        package_id: 0,
                        payload: Vec::new(),
                    };
                    let _ = socket.send_to(&switcher_wire_bytes(&hello), from).await;

                    let mut dump = bus_frame(&names::PROGRAM_INPUT, 0, 3);
                    dump.extend(bus_frame(&names::PREVIEW_INPUT, 0, 5));
                    let state = data_packet(MOCK_SESSION_ID, 1, dump);
                    let _ = socket.send_to(&switcher_wire_bytes(&state), from).await;
                } else if acknowledges_dump && !update_sent {
                    update_sent = true;
                    let change =
                        data_packet(MOCK_SESSION_ID, 2, bus_frame(&names::PROGRAM_INPUT, 0, 8));
                    let _ = socket.send_to(&switcher_wire_bytes(&change), from).await;
                }
            }
        });

        Ok(Self { addr, inbound: inbound_rx })
    }

    async fn next_packet(&mut self) -> Result<TransportPacket> {
        timeout(Duration::from_secs(1), self.inbound.recv())
            .await
            .context("timed out waiting for a packet at the mock switcher")?
            .context("mock switcher stopped")
    }
}

async fn next_event(
    events: &mut (impl futures::Stream<Item = SwitcherEvent> + Unpin),
) -> Result<SwitcherEvent> {
    timeout(Duration::from_secs(1), events.next())
        .await
        .context("timed out waiting for an event")?
        .context("event stream ended")
}

#[tokio::test]
async fn handshake_establishes_and_reports_tally() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let mut switcher = MockSwitcher::spawn().await?;
    let connection = SwitcherConnection::connect_to(switcher.addr).await?;
    let mut events = Box::pin(connection.events());

    connection
        .wait_established_within(Duration::from_secs(2))
        .await
        .context("session never established")?;
    info!("session established against mock switcher");

    assert!(connection.is_established());
    assert_eq!(connection.tally_state().session_id, MOCK_SESSION_ID);
    assert_eq!(connection.program_input(0), Some(3));
    assert_eq!(connection.preview_input(0), Some(5));
    assert_eq!(connection.program_input(1), None);

    // The initial dump produces Connected first, then one edge per bus.
    assert_eq!(next_event(&mut events).await?, SwitcherEvent::Connected);
    assert_eq!(
        next_event(&mut events).await?,
        SwitcherEvent::ProgramInputChanged { mix_effect: 0, input: 3 }
    );
    assert_eq!(
        next_event(&mut events).await?,
        SwitcherEvent::PreviewInputChanged { mix_effect: 0, input: 5 }
    );

    // Wire traffic: handshake, ack for the HELLO, ack for the dump.
    let handshake = switcher.next_packet().await?;
    assert!(handshake.flags.has_flag(PacketFlags::CONNECT));
    assert!(handshake.flags.has_flag(PacketFlags::HELLO));
    assert_eq!(handshake.package_id, 0);
    assert_eq!(handshake.session_id, 0);
    // Outbound headers carry two reserved bytes the receive-side layout
    // treats as payload, so the greeting sits two bytes in.
    assert_eq!(&handshake.payload[2..], &HANDSHAKE_GREETING[..]);

    let hello_ack = switcher.next_packet().await?;
    assert!(hello_ack.flags.has_flag(PacketFlags::ACK));
    assert_eq!(hello_ack.acknowledgment, 0);
    assert_eq!(hello_ack.session_id, MOCK_SESSION_ID);

    let dump_ack = switcher.next_packet().await?;
    assert_eq!(dump_ack.acknowledgment, 1);
    assert_eq!(dump_ack.session_id, MOCK_SESSION_ID);

    // The pushed change arrives as a single further edge.
    assert_eq!(
        next_event(&mut events).await?,
        SwitcherEvent::ProgramInputChanged { mix_effect: 0, input: 8 }
    );
    assert_eq!(connection.program_input(0), Some(8));
    assert_eq!(connection.preview_input(0), Some(5));

    Ok(())
}

#[tokio::test]
async fn disconnect_emits_disconnected_event() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    // A bound socket that never answers: the connection stays handshaking.
    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let connection = SwitcherConnection::connect_to(silent.local_addr()?).await?;
    let mut events = Box::pin(connection.events());

    connection.disconnect();
    assert_eq!(next_event(&mut events).await?, SwitcherEvent::Disconnected);
    assert!(!connection.is_established());

    Ok(())
}

#[tokio::test]
async fn wait_established_times_out_against_a_silent_peer() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let connection = SwitcherConnection::connect_to(silent.local_addr()?).await?;

    let err = connection
        .wait_established_within(Duration::from_millis(200))
        .await
        .expect_err("a silent peer must not establish");
    assert!(matches!(err, SwitcherError::Timeout { .. }));

    Ok(())
}

#[tokio::test]
async fn prober_reports_only_the_responsive_candidate() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let switcher = MockSwitcher::spawn().await?;
    let silent_a = UdpSocket::bind("127.0.0.1:0").await?;
    let silent_b = UdpSocket::bind("127.0.0.1:0").await?;

    let candidates = vec![silent_a.local_addr()?, switcher.addr, silent_b.local_addr()?];
    let mut prober = DeviceProber::probe(candidates);

    let device = timeout(Duration::from_secs(5), prober.next_device())
        .await
        .context("prober reported nothing before the deadline")?
        .context("probe ended without any device")?;
    assert_eq!(device.address, switcher.addr);
    assert_eq!(device.label, "ATEM Switcher");

    // The silent candidates run out their deadline; the probe then ends
    // without further reports.
    let rest = timeout(Duration::from_secs(5), prober.next_device())
        .await
        .context("probe did not finish")?;
    assert!(rest.is_none(), "only one candidate should be reported, got {rest:?}");

    Ok(())
}

#[tokio::test]
async fn stop_cancels_probing_early() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let mut prober = DeviceProber::probe(vec![silent.local_addr()?]);
    prober.stop();

    // Well under the 2s probe deadline: cancellation must end the probe.
    let rest = timeout(Duration::from_secs(1), prober.next_device())
        .await
        .context("stop() did not end the probe")?;
    assert!(rest.is_none());

    Ok(())
}
