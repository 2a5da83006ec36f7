//! # Ferry Link
//!
//! Serial link layer for Ferry.
//!
//! This crate provides:
//! - The [`Link`] trait: blocking, timeout-bounded chunk reads and writes
//! - [`SerialLink`], a `serialport` device opened with hardware flow control
//! - Port enumeration for operator selection
//! - In-memory and scripted links for tests (`test-util` feature)
//!
//! A read that times out is not an error: it returns `Ok(0)` so callers can
//! keep polling. Anything else that goes wrong on an open link is a
//! [`LinkError::Port`] and is fatal to the session using it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ports;
pub mod serial;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use error::{LinkError, Result};
pub use ports::{PortInfo, available_ports};
pub use serial::SerialLink;

use std::time::Duration;

/// Baud rate used when the operator gives none, or gives one that does not parse.
pub const DEFAULT_BAUD_RATE: u32 = 2_000_000;

/// Default read timeout for links that only write.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Default read timeout for links that capture incoming data.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Flow-control signal pairs enabled on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    /// RTS/CTS handshaking
    pub rts_cts: bool,
    /// DSR/DTR handshaking
    pub dsr_dtr: bool,
}

impl FlowControl {
    /// Both hardware handshakes enabled, the default for every [`LinkConfig`].
    pub const HARDWARE: Self = Self {
        rts_cts: true,
        dsr_dtr: true,
    };
}

/// Parameters a [`SerialLink`] is opened with.
///
/// Fixed for the lifetime of the link; reconfiguring means closing and
/// opening again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// OS device identifier (`/dev/ttyUSB0`, `COM8`, ...)
    pub device: String,
    /// Line rate, identical on both ends
    pub baud_rate: u32,
    /// Upper bound on a single blocking read
    pub timeout: Duration,
    /// Handshake lines driven on open
    pub flow_control: FlowControl,
}

impl LinkConfig {
    /// Config for `device` at `baud_rate` with the send-side default timeout.
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            timeout: DEFAULT_SEND_TIMEOUT,
            flow_control: FlowControl::HARDWARE,
        }
    }

    /// Replace the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject configurations no port would accept.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidConfig`] for an empty device name, a zero
    /// baud rate or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(LinkError::InvalidConfig("device name is empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(LinkError::InvalidConfig("baud rate must be positive".into()));
        }
        if self.timeout.is_zero() {
            return Err(LinkError::InvalidConfig("read timeout must be positive".into()));
        }
        Ok(())
    }
}

/// A byte pipe with timeout-bounded reads.
///
/// Implementations release the underlying device when dropped, so a session
/// that exits early through `?` still closes its link.
pub trait Link: Send {
    /// Human-readable name of the link endpoint.
    fn name(&self) -> &str;

    /// Read at most `buf.len()` bytes.
    ///
    /// Blocks for no longer than the link's read timeout. `Ok(0)` means the
    /// timeout elapsed with no data.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Port`] on an I/O failure and [`LinkError::Closed`]
    /// after [`Link::close`].
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write every byte of `data`, waiting out flow-control stalls.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Port`] on an I/O failure and [`LinkError::Closed`]
    /// after [`Link::close`].
    fn write_chunk(&mut self, data: &[u8]) -> Result<usize>;

    /// Push buffered output to the device.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Port`] if the driver reports a failure.
    fn flush(&mut self) -> Result<()>;

    /// Release the device. Idempotent.
    fn close(&mut self);

    /// Whether the link still holds its device.
    fn is_open(&self) -> bool;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(buf)
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write_chunk(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
