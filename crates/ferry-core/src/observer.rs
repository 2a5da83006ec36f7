//! Hooks a session calls as it runs.
//!
//! Sessions never print or prompt themselves. The operator shell implements
//! these traits to draw progress and to answer the drain offer.

use crate::rate::Throughput;
use std::time::Duration;

/// Snapshot passed to [`TransferObserver::on_progress`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Bytes moved so far
    pub total_bytes: u64,
    /// Size of the source file, when sending
    pub expected_bytes: Option<u64>,
    /// Time since the session clock started
    pub elapsed: Duration,
    /// Average rate, absent until time has passed
    pub throughput: Option<Throughput>,
}

impl ProgressUpdate {
    /// Completion fraction in `0.0..=1.0`, when the total is known.
    ///
    /// An empty source counts as complete.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        let expected = self.expected_bytes?;
        if expected == 0 {
            return Some(1.0);
        }
        Some((self.total_bytes as f64 / expected as f64).min(1.0))
    }
}

/// Progress hooks shared by both session kinds. Every method defaults to
/// doing nothing.
pub trait TransferObserver {
    /// The session is about to move data. `expected_bytes` is known for sends.
    fn on_start(&mut self, expected_bytes: Option<u64>) {
        let _ = expected_bytes;
    }

    /// A chunk was moved.
    fn on_progress(&mut self, update: &ProgressUpdate) {
        let _ = update;
    }

    /// The session completed with `total_bytes` moved.
    fn on_finish(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }
}

/// Extra hooks for a receive.
pub trait ReceiveObserver: TransferObserver {
    /// Bytes were already waiting when the link opened. Return `true` to keep
    /// them at the front of the capture.
    fn offer_pending(&mut self, pending: &[u8]) -> bool;

    /// The stop listener is running and the session is waiting for data.
    fn on_listening(&mut self) {}

    /// The first streamed byte arrived; throughput is measured from here.
    fn on_first_byte(&mut self) {}

    /// The stop request was seen with `total_bytes` captured.
    fn on_stopped(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }
}

/// Observer that ignores everything and declines any pending bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl TransferObserver for Silent {}

impl ReceiveObserver for Silent {
    fn offer_pending(&mut self, _pending: &[u8]) -> bool {
        false
    }
}
