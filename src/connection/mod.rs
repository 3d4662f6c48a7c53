//! Connection handle for one switcher session.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use futures::Stream;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::{Result, SwitcherError};
use crate::types::{SwitcherEvent, TallyState};

#[cfg(test)]
mod tests;

/// One UDP session with a switcher.
///
/// `connect` opens the socket and starts the receive task, which drives the
/// handshake on its own; the session is live once the [`SwitcherEvent::Connected`]
/// event fires (or [`SwitcherConnection::wait_established`] returns). A failed
/// handshake manifests only as that event never arriving; reconnect policy
/// belongs to the caller, who creates a fresh connection for each attempt.
///
/// Dropping the handle cancels the receive task.
pub struct SwitcherConnection {
    events: broadcast::Sender<SwitcherEvent>,
    state: watch::Receiver<TallyState>,
    cancel: CancellationToken,
    peer: SocketAddr,
}

impl SwitcherConnection {
    /// UDP port switchers listen on.
    pub const DEFAULT_PORT: u16 = 9910;

    /// Connect to a switcher by host name or address on the default port.
    pub async fn connect(host: &str) -> Result<Self> {
        let addr = tokio::net::lookup_host((host, Self::DEFAULT_PORT))
            .await
            .map_err(|e| {
                SwitcherError::connection_failed_with_source(
                    format!("cannot resolve '{host}'"),
                    Box::new(e),
                )
            })?
            .next()
            .ok_or_else(|| {
                SwitcherError::connection_failed(format!("no addresses found for '{host}'"))
            })?;
        Self::connect_to(addr).await
    }

    /// Connect to a switcher at an explicit address.
    pub async fn connect_to(addr: SocketAddr) -> Result<Self> {
        info!(%addr, "connecting to switcher");

        let bind_addr: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| SwitcherError::socket("binding local socket", e))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| SwitcherError::socket(format!("connecting socket to {addr}"), e))?;

        let channels = Driver::spawn(socket);

        Ok(Self {
            events: channels.events,
            state: channels.state,
            cancel: channels.cancel,
            peer: addr,
        })
    }

    /// Subscribe to state-change events.
    ///
    /// The stream yields events emitted after subscription; it does not
    /// replay history. Current state is always available through the
    /// lookup methods, so subscribing late loses nothing but the edges.
    /// A subscriber that falls more than a buffer's worth behind skips
    /// the overwritten events.
    pub fn events(&self) -> impl Stream<Item = SwitcherEvent> + Unpin + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }

    /// Wait until the session is established.
    ///
    /// Returns an error if the connection is torn down before the switcher
    /// ever sends state.
    pub async fn wait_established(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|tally| tally.established)
            .await
            .map(|_| ())
            .map_err(|_| {
                SwitcherError::connection_failed("connection closed before the switcher responded")
            })
    }

    /// Wait until the session is established, giving up after `deadline`.
    pub async fn wait_established_within(&self, deadline: Duration) -> Result<()> {
        tokio::time::timeout(deadline, self.wait_established())
            .await
            .map_err(|_| SwitcherError::Timeout { duration: deadline })?
    }

    /// Last known program input for a mix-effect, or `None` if that bus has
    /// never been reported.
    pub fn program_input(&self, mix_effect: u16) -> Option<u16> {
        self.state.borrow().program_input(mix_effect)
    }

    /// Last known preview input for a mix-effect, or `None` if that bus has
    /// never been reported.
    pub fn preview_input(&self, mix_effect: u16) -> Option<u16> {
        self.state.borrow().preview_input(mix_effect)
    }

    /// Snapshot of the full tally state.
    pub fn tally_state(&self) -> TallyState {
        self.state.borrow().clone()
    }

    /// Whether the first state-carrying packet has been processed.
    pub fn is_established(&self) -> bool {
        self.state.borrow().established
    }

    /// Address this connection talks to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Tear the connection down.
    ///
    /// Cancels the socket and receive task immediately; no goodbye packet
    /// is sent and in-flight sends are not awaited. Reconnecting means
    /// creating a fresh connection.
    pub fn disconnect(&self) {
        debug!(peer = %self.peer, "disconnecting");
        self.cancel.cancel();
    }
}

impl Drop for SwitcherConnection {
    fn drop(&mut self) {
        // Cancel the receive task on drop for clean shutdown
        self.cancel.cancel();
    }
}
