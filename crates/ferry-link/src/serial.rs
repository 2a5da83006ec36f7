//! Serial device link backed by the `serialport` crate.

use crate::error::{LinkError, Result};
use crate::{FlowControl, Link, LinkConfig};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};

/// An open serial device with hardware flow control.
///
/// Baud rate, timeout and flow control are fixed at [`SerialLink::open`].
/// The device handle is released by [`Link::close`] or on drop, whichever
/// comes first.
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    config: LinkConfig,
}

impl SerialLink {
    /// Open `config.device` at 8N1 with the handshakes in `config.flow_control`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidConfig`] if the config fails validation and
    /// [`LinkError::PortUnavailable`] if the device cannot be opened.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        config.validate()?;

        let mut port = serialport::new(config.device.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(port_flow_control(config.flow_control))
            .timeout(config.timeout)
            .open()
            .map_err(|e| LinkError::unavailable(&config.device, &e))?;

        // serialport only drives RTS/CTS; DTR is raised by hand so a peer
        // watching DSR sees us as ready.
        if config.flow_control.dsr_dtr {
            port.write_data_terminal_ready(true)
                .map_err(|e| LinkError::unavailable(&config.device, &e))?;
        }

        tracing::info!(
            device = %config.device,
            baud = config.baud_rate,
            timeout_ms = config.timeout.as_millis() as u64,
            rts_cts = config.flow_control.rts_cts,
            dsr_dtr = config.flow_control.dsr_dtr,
            "Opened serial link"
        );

        Ok(Self {
            port: Some(port),
            config: config.clone(),
        })
    }

    /// Configured line rate
    #[must_use]
    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    /// Flow control in effect
    #[must_use]
    pub fn flow_control(&self) -> FlowControl {
        self.config.flow_control
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(LinkError::Closed)
    }
}

fn port_flow_control(flow: FlowControl) -> serialport::FlowControl {
    if flow.rts_cts {
        serialport::FlowControl::Hardware
    } else {
        serialport::FlowControl::None
    }
}

/// Timeout-class errors mean "nothing moved yet", not a broken port.
fn is_stall(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Write all of `data`, retrying while the peer holds CTS low.
///
/// Each stalled attempt blocks for at most the port's write timeout. A write
/// that returns `Ok(0)` has no such bound and is reported as `WriteZero`.
fn write_held<W: Write + ?Sized>(port: &mut W, data: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < data.len() {
        match port.write(&data[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "serial port accepted no bytes",
                ));
            }
            Ok(n) => written += n,
            Err(e) if is_stall(&e) => {
                tracing::trace!(pending = data.len() - written, "write held by flow control");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

impl Link for SerialLink {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.port()?.read(buf) {
            Ok(n) => {
                if n > 0 {
                    tracing::trace!(bytes = n, "serial read");
                }
                Ok(n)
            }
            Err(e) if is_stall(&e) => Ok(0),
            Err(e) => Err(LinkError::Port(e)),
        }
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        write_held(self.port()?, data).map_err(LinkError::Port)
    }

    fn flush(&mut self) -> Result<()> {
        let port = self.port()?;
        loop {
            match port.flush() {
                Ok(()) => return Ok(()),
                Err(e) if is_stall(&e) => continue,
                Err(e) => return Err(LinkError::Port(e)),
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!(device = %self.config.device, "Closed serial link");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}
