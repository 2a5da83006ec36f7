//! Running byte count and clock for one session.

use std::time::{Duration, Instant};

/// Byte count, start time and first-byte flag of a session.
///
/// The byte count only grows. The start time is set when the counters are
/// created and moved at most once, to the arrival of the first streamed byte.
#[derive(Debug, Clone)]
pub struct SessionCounters {
    total_bytes: u64,
    started_at: Instant,
    first_byte_received: bool,
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCounters {
    /// Counters starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Counters starting at `start`.
    #[must_use]
    pub fn starting_at(start: Instant) -> Self {
        Self {
            total_bytes: 0,
            started_at: start,
            first_byte_received: false,
        }
    }

    /// Add `bytes` to the total and return the new total.
    pub fn record(&mut self, bytes: usize) -> u64 {
        self.total_bytes = self.total_bytes.saturating_add(bytes as u64);
        self.total_bytes
    }

    /// Mark the first streamed byte and restart the clock at `now`.
    ///
    /// Only the first call has any effect; returns whether it was this one.
    pub fn mark_first_byte(&mut self, now: Instant) -> bool {
        if self.first_byte_received {
            return false;
        }
        self.first_byte_received = true;
        self.started_at = now;
        true
    }

    /// Bytes moved so far
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Instant throughput is measured from
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Whether a streamed byte has arrived
    #[must_use]
    pub fn first_byte_received(&self) -> bool {
        self.first_byte_received
    }

    /// Time from the start to `now`, zero if `now` is earlier.
    #[must_use]
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut counters = SessionCounters::new();
        assert_eq!(counters.record(10), 10);
        assert_eq!(counters.record(0), 10);
        assert_eq!(counters.record(1014), 1024);
        assert_eq!(counters.total_bytes(), 1024);
    }

    #[test]
    fn test_first_byte_resets_clock_once() {
        let start = Instant::now();
        let mut counters = SessionCounters::starting_at(start);
        assert!(!counters.first_byte_received());

        let first = start + Duration::from_secs(5);
        assert!(counters.mark_first_byte(first));
        assert_eq!(counters.started_at(), first);

        let later = start + Duration::from_secs(9);
        assert!(!counters.mark_first_byte(later));
        assert_eq!(counters.started_at(), first);
        assert!(counters.first_byte_received());
    }

    #[test]
    fn test_elapsed_never_negative() {
        let start = Instant::now() + Duration::from_secs(60);
        let counters = SessionCounters::starting_at(start);
        assert_eq!(counters.elapsed_at(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_record_saturates() {
        let mut counters = SessionCounters::new();
        counters.total_bytes = u64::MAX - 1;
        assert_eq!(counters.record(10), u64::MAX);
    }
}
