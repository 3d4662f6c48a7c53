//! Driver spawns and manages the per-connection receive task

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::session::Session;
use crate::types::{SwitcherEvent, TallyState};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 64;

/// Receive buffer size; comfortably above any single control datagram.
const MAX_DATAGRAM_LEN: usize = 2048;

/// Result of spawning the receive task
pub(crate) struct DriverChannels {
    /// Sender half used to create event subscriptions
    pub events: broadcast::Sender<SwitcherEvent>,
    /// Receiver for tally state snapshots
    pub state: watch::Receiver<TallyState>,
    /// Cancellation token for shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns the task that owns one connection's socket and state.
///
/// The task is the only writer of the `Session`: socket reads, socket
/// writes, and state mutation all happen on it, in datagram receipt order.
/// Events and state snapshots leave through channels; both hand-offs are
/// fire-and-forget and never block the receive path.
pub(crate) struct Driver;

impl Driver {
    /// Spawn the receive task for a connected socket.
    ///
    /// The task sends the handshake as soon as it starts, then processes
    /// datagrams until cancellation or socket failure.
    pub fn spawn(socket: UdpSocket) -> DriverChannels {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(TallyState::default());
        let cancel = CancellationToken::new();

        let task_events = event_tx.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            Self::receive_task(socket, Session::new(), task_events, state_tx, task_cancel).await;
        });

        DriverChannels { events: event_tx, state: state_rx, cancel }
    }

    async fn receive_task(
        socket: UdpSocket,
        mut session: Session,
        event_tx: broadcast::Sender<SwitcherEvent>,
        state_tx: watch::Sender<TallyState>,
        cancel: CancellationToken,
    ) {
        info!(peer = ?socket.peer_addr().ok(), "receive task started");

        // Open the handshake. If it is lost, no reconnect is attempted
        // here; the caller notices the missing Connected event.
        let handshake = session.handshake_packet();
        if let Err(e) = socket.send(&handshake.encode()).await {
            warn!(error = %e, "failed to send handshake");
            let _ = event_tx.send(SwitcherEvent::Disconnected);
            return;
        }
        debug!("handshake sent");

        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let mut datagram_count = 0u64;

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("receive task cancelled");
                    break;
                }
                result = socket.recv(&mut buf) => result,
            };

            match received {
                Ok(len) => {
                    datagram_count += 1;
                    trace!(
                        len,
                        datagram_count,
                        remote_package_id = session.remote_package_id(),
                        "datagram received"
                    );

                    match session.handle_datagram(&buf[..len]) {
                        Ok(step) => {
                            if let Some(reply) = step.reply {
                                if let Err(e) = socket.send(&reply.encode()).await {
                                    warn!(error = %e, "failed to send acknowledgment");
                                    let _ = event_tx.send(SwitcherEvent::Disconnected);
                                    break;
                                }
                            }

                            // Snapshot before events so a subscriber reacting
                            // to an event sees the updated lookups.
                            state_tx.send_replace(session.snapshot());
                            for event in step.events {
                                let _ = event_tx.send(event);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "dropping undecodable datagram");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "socket receive failed");
                    let _ = event_tx.send(SwitcherEvent::Disconnected);
                    break;
                }
            }
        }

        if cancel.is_cancelled() {
            let _ = event_tx.send(SwitcherEvent::Disconnected);
        }

        info!(datagram_count, "receive task ended");
    }
}
