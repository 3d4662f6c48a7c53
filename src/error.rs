//! Error types for switcher protocol processing.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. Nothing in this crate treats an error as fatal to the process:
//! a malformed datagram is dropped, a truncated command frame simply ends
//! payload parsing, and a transport failure surfaces as a `Disconnected`
//! event. Recovery is always "reconnect and try again".
//!
//! ## Recovery and Retry
//!
//! Errors report whether retrying the operation can help:
//!
//! ```rust
//! use atemlink::SwitcherError;
//!
//! let error = SwitcherError::connection_failed("switcher not reachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for switcher operations.
pub type Result<T, E = SwitcherError> = std::result::Result<T, E>;

/// Main error type for switcher operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SwitcherError {
    #[error("Failed to connect to switcher: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Malformed packet: {details}")]
    MalformedPacket { details: String },

    #[error("Socket error while {context}")]
    Socket {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl SwitcherError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SwitcherError::Connection { .. } => true,
            SwitcherError::Socket { .. } => true,
            SwitcherError::Timeout { .. } => true,
            SwitcherError::MalformedPacket { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SwitcherError::Connection { .. } => vec![
                "Check the switcher is powered on and reachable",
                "Verify the address and port (ATEM control is UDP 9910)",
                "Check no other controller holds the session",
            ],
            SwitcherError::Socket { .. } => vec![
                "Check local network interfaces are up",
                "Verify firewall rules allow outbound UDP",
            ],
            SwitcherError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check the switcher responds on this network segment",
            ],
            SwitcherError::MalformedPacket { .. } => vec![
                "Capture the offending traffic for analysis",
                "Verify nothing else is sending to the local port",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        SwitcherError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SwitcherError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for malformed packet errors.
    pub fn malformed_packet(details: impl Into<String>) -> Self {
        SwitcherError::MalformedPacket { details: details.into() }
    }

    /// Helper constructor for socket errors with operation context.
    pub fn socket(context: impl Into<String>, source: std::io::Error) -> Self {
        SwitcherError::Socket { context: context.into(), source }
    }
}

impl From<std::io::Error> for SwitcherError {
    fn from(err: std::io::Error) -> Self {
        SwitcherError::Socket { context: "socket operation".to_string(), source: err }
    }
}
