//! Modern, type-safe Rust client for Blackmagic ATEM switchers.
//!
//! We Race Atemlink speaks the switcher's UDP control protocol and surfaces
//! live production state (which input is on air and which is in preview on
//! each mix-effect) as typed events and queryable tally state.
//!
//! # Features
//!
//! - **Live Tally**: program/preview changes streamed as they happen
//! - **Bit-exact Framing**: the exact packet layout real units speak
//! - **Async Core**: one tokio task per connection, no locks, no blocking
//! - **Probing**: find switchers at their factory-default addresses
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use atemlink::{Atemlink, SwitcherEvent};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Atemlink::connect("192.168.1.240").await?;
//!     let mut events = connection.events();
//!
//!     while let Some(event) = events.next().await {
//!         match event {
//!             SwitcherEvent::ProgramInputChanged { mix_effect, input } => {
//!                 println!("ME{} program -> input {}", mix_effect + 1, input);
//!             }
//!             SwitcherEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod protocol;
pub mod types;

// Connection architecture
pub mod connection;
pub mod discovery;
mod driver;
mod session;

// Core exports
pub use connection::SwitcherConnection;
pub use discovery::DeviceProber;
pub use error::{Result, SwitcherError};
pub use protocol::{CommandFrame, CommandFrames, PacketFlags, TransportPacket};
pub use types::{DiscoveredDevice, SwitcherEvent, TallyState};

/// Unified entry point for switcher connections.
///
/// # Examples
///
/// ## Connect to a known switcher
/// ```rust,no_run
/// use atemlink::Atemlink;
///
/// #[tokio::main]
/// async fn main() -> atemlink::Result<()> {
///     let connection = Atemlink::connect("192.168.1.240").await?;
///     connection.wait_established().await?;
///     println!("ME1 program: {:?}", connection.program_input(0));
///     Ok(())
/// }
/// ```
///
/// ## Probe for switchers
/// ```rust,no_run
/// use atemlink::Atemlink;
///
/// #[tokio::main]
/// async fn main() {
///     let mut prober = Atemlink::discover();
///     while let Some(device) = prober.next_device().await {
///         println!("{} at {}", device.label, device.address);
///     }
/// }
/// ```
pub struct Atemlink;

impl Atemlink {
    /// Connect to a switcher by host name or address on the default port.
    ///
    /// The returned connection is still handshaking; subscribe to
    /// [`SwitcherConnection::events`] or await
    /// [`SwitcherConnection::wait_established`] to know when it is live.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve or the local socket
    /// cannot be opened. An unreachable switcher is NOT an error
    /// here, since UDP has no connect-time failure; it shows up as the
    /// `Connected` event never firing.
    pub async fn connect(host: &str) -> Result<SwitcherConnection> {
        SwitcherConnection::connect(host).await
    }

    /// Probe the factory-default addresses for switchers.
    ///
    /// This is a bounded probe over a short fixed address list, not a
    /// network-wide discovery; see [`discovery`] for the candidate list and
    /// deadline.
    pub fn discover() -> DeviceProber {
        DeviceProber::start()
    }
}
