//! Error types for serial links

use thiserror::Error;

/// Errors raised by a [`Link`](crate::Link)
#[derive(Debug, Error)]
pub enum LinkError {
    /// The device could not be opened (wrong name, in use, removed)
    #[error("Port {device} unavailable: {reason}")]
    PortUnavailable {
        /// Device the open was attempted on
        device: String,
        /// Driver-reported cause
        reason: String,
    },

    /// I/O failure on an open link
    #[error("Port I/O error: {0}")]
    Port(#[from] std::io::Error),

    /// The link was already closed
    #[error("Link is closed")]
    Closed,

    /// Parameters no port would accept
    #[error("Invalid link configuration: {0}")]
    InvalidConfig(String),

    /// The OS could not list serial ports
    #[error("Port enumeration failed: {0}")]
    Enumeration(String),
}

impl LinkError {
    pub(crate) fn unavailable(device: &str, err: &serialport::Error) -> Self {
        Self::PortUnavailable {
            device: device.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;
