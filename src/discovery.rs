//! Bounded-candidate probe for switchers at well-known addresses.
//!
//! This is a static probe, not a discovery protocol: it tries a short fixed
//! list of addresses switchers commonly ship with and reports the ones whose
//! handshake completes within a deadline. Devices outside the list are never
//! found, and a device that answers after the deadline is missed. Anything
//! stronger (mDNS, broadcast) belongs to a different layer.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::SwitcherConnection;
use crate::types::DiscoveredDevice;

/// Factory-default addresses switchers commonly answer on.
pub const DEFAULT_CANDIDATES: [IpAddr; 3] = [
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, 240)),
    IpAddr::V4(Ipv4Addr::new(192, 168, 10, 240)),
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, 240)),
];

/// How long each candidate gets to complete a handshake before its transient
/// connection is torn down, found or not.
pub const PROBE_DEADLINE: Duration = Duration::from_secs(2);

const DEVICE_LABEL: &str = "ATEM Switcher";

/// Probes candidate addresses with transient connections.
///
/// Each candidate gets its own connection, probed concurrently. Dropping the
/// prober (or calling [`DeviceProber::stop`]) cancels whatever is still in
/// flight.
pub struct DeviceProber {
    devices: mpsc::UnboundedReceiver<DiscoveredDevice>,
    cancel: CancellationToken,
}

impl DeviceProber {
    /// Probe the default candidate list on the default port.
    pub fn start() -> Self {
        Self::probe(
            DEFAULT_CANDIDATES
                .iter()
                .map(|&ip| SocketAddr::new(ip, SwitcherConnection::DEFAULT_PORT)),
        )
    }

    /// Probe an explicit candidate list.
    pub fn probe(candidates: impl IntoIterator<Item = SocketAddr>) -> Self {
        let cancel = CancellationToken::new();
        let (found_tx, found_rx) = mpsc::unbounded_channel();

        let mut count = 0usize;
        for addr in candidates {
            count += 1;
            let found = found_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                probe_candidate(addr, found, cancel).await;
            });
        }
        // The probe tasks hold the only remaining senders, so the device
        // channel closes when the last probe finishes.
        drop(found_tx);

        info!(candidates = count, "probing for switchers");
        Self { devices: found_rx, cancel }
    }

    /// Next device found, or `None` once every probe has finished.
    pub async fn next_device(&mut self) -> Option<DiscoveredDevice> {
        self.devices.recv().await
    }

    /// Best-effort cancellation of any probing still in progress.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DeviceProber {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn probe_candidate(
    addr: SocketAddr,
    found: mpsc::UnboundedSender<DiscoveredDevice>,
    cancel: CancellationToken,
) {
    let connection = match SwitcherConnection::connect_to(addr).await {
        Ok(connection) => connection,
        Err(e) => {
            debug!(%addr, error = %e, "probe could not open a socket");
            return;
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%addr, "probe cancelled");
        }
        result = connection.wait_established_within(PROBE_DEADLINE) => match result {
            Ok(()) => {
                info!(%addr, "switcher found");
                let _ = found.send(DiscoveredDevice {
                    address: addr,
                    label: DEVICE_LABEL.to_string(),
                });
            }
            Err(e) => {
                debug!(%addr, error = %e, "no switcher within deadline");
            }
        },
    }

    // Transient by contract: torn down whether or not anything answered.
    connection.disconnect();
}
