//! In-memory link pairs for exercising sessions without hardware.
//!
//! Each end of a [`MemoryLink::pair`] writes into an unbounded channel the
//! other end reads from, so a writer never stalls (an infinitely deep
//! receive buffer). Reads honour the configured timeout exactly like a serial
//! device: no data within the timeout is `Ok(0)`.

use crate::error::{LinkError, Result};
use crate::Link;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// One end of an in-memory byte pipe.
pub struct MemoryLink {
    name: String,
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    timeout: Duration,
}

impl MemoryLink {
    /// Create two connected ends sharing the same read timeout.
    pub fn pair(timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (
            Self {
                name: "memory-a".into(),
                tx: Some(a_tx),
                rx: a_rx,
                pending: VecDeque::new(),
                timeout,
            },
            Self {
                name: "memory-b".into(),
                tx: Some(b_tx),
                rx: b_rx,
                pending: VecDeque::new(),
                timeout,
            },
        )
    }

    /// Bytes already delivered to this end but not yet read.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len() + self.rx.len()
    }

    fn pull_available(&mut self, want: usize) {
        while self.pending.len() < want {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl Link for MemoryLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.tx.is_none() {
            return Err(LinkError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    // A serial line with nobody on the other end just stays quiet.
                    std::thread::sleep(self.timeout);
                    return Ok(0);
                }
            }
        }
        self.pull_available(buf.len());

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        let tx = self.tx.as_ref().ok_or(LinkError::Closed)?;
        if data.is_empty() {
            return Ok(0);
        }
        tx.send(data.to_vec()).map_err(|_| {
            LinkError::Port(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer end of memory link dropped",
            ))
        })?;
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        if self.tx.is_none() {
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.tx = None;
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}
