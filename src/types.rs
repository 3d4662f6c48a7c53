//! Public event and state types emitted by a switcher connection.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// State-change notification produced on the connection's receive path.
///
/// Events are produced on the connection's own task; any marshaling onto a
/// UI context is the subscriber's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitcherEvent {
    /// The first state-carrying packet of the session has been processed.
    /// Fired exactly once per connection.
    Connected,
    /// The socket failed, was cancelled, or the connection was dropped.
    Disconnected,
    /// A mix-effect put a different input on the program bus.
    ProgramInputChanged { mix_effect: u16, input: u16 },
    /// A mix-effect staged a different input on the preview bus.
    PreviewInputChanged { mix_effect: u16, input: u16 },
}

/// Last known program/preview assignments, keyed by mix-effect index.
///
/// Mix-effects appear lazily as the switcher reports them; an absent key
/// means that bus has never been reported this session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyState {
    /// Session id assigned by the switcher; 0 until the handshake answer.
    pub session_id: u16,
    /// True once the first non-empty payload has been processed.
    pub established: bool,
    /// Program (on-air) input per mix-effect.
    pub program: HashMap<u16, u16>,
    /// Preview (staged) input per mix-effect.
    pub preview: HashMap<u16, u16>,
}

impl TallyState {
    /// Last known program input for a mix-effect, if ever reported.
    pub fn program_input(&self, mix_effect: u16) -> Option<u16> {
        self.program.get(&mix_effect).copied()
    }

    /// Last known preview input for a mix-effect, if ever reported.
    pub fn preview_input(&self, mix_effect: u16) -> Option<u16> {
        self.preview.get(&mix_effect).copied()
    }
}

/// A switcher that completed its handshake during a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Address the device answered on.
    pub address: SocketAddr,
    /// Descriptive label for presentation.
    pub label: String,
}
