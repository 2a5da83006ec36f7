//! Throughput metering.
//!
//! Throughput is derived entirely from [`SessionCounters`]: total bytes over
//! time since the session clock started, in KiB per second. Nothing is
//! reported until some time has passed, so the division is always defined.

use crate::counters::SessionCounters;
use std::fmt;
use std::time::{Duration, Instant};

const BYTES_PER_KIB: f64 = 1024.0;

/// Average transfer rate in KiB/s
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Throughput(f64);

impl Throughput {
    /// KiB per second
    #[must_use]
    pub fn kib_per_sec(self) -> f64 {
        self.0
    }

    /// Bytes per second
    #[must_use]
    pub fn bytes_per_sec(self) -> f64 {
        self.0 * BYTES_PER_KIB
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} KB/s", self.0)
    }
}

/// Throughput for `total_bytes` moved in `elapsed_secs`.
///
/// Returns `None` when `elapsed_secs` is not positive.
#[must_use]
pub fn report(total_bytes: u64, elapsed_secs: f64) -> Option<Throughput> {
    if elapsed_secs.is_nan() || elapsed_secs <= 0.0 {
        return None;
    }
    Some(Throughput(total_bytes as f64 / elapsed_secs / BYTES_PER_KIB))
}

/// Throughput for `total_bytes` moved over `elapsed`.
#[must_use]
pub fn report_over(total_bytes: u64, elapsed: Duration) -> Option<Throughput> {
    report(total_bytes, elapsed.as_secs_f64())
}

/// Throughput of a session as of `now`.
#[must_use]
pub fn sample(counters: &SessionCounters, now: Instant) -> Option<Throughput> {
    report_over(counters.total_bytes(), counters.elapsed_at(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_report_kib_per_second() {
        let rate = report(2048, 2.0).unwrap();
        assert!((rate.kib_per_sec() - 1.0).abs() < f64::EPSILON);
        assert!((rate.bytes_per_sec() - 1024.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_suppressed_without_elapsed_time() {
        assert!(report(4096, 0.0).is_none());
        assert!(report(4096, -1.0).is_none());
        assert!(report(4096, f64::NAN).is_none());
        assert!(report_over(4096, Duration::ZERO).is_none());
    }

    #[test]
    fn test_sample_uses_session_clock() {
        let start = Instant::now();
        let mut counters = SessionCounters::starting_at(start);
        counters.record(10 * 1024);
        let rate = sample(&counters, start + Duration::from_secs(5)).unwrap();
        assert!((rate.kib_per_sec() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        assert_eq!(report(1536, 1.0).unwrap().to_string(), "1.50 KB/s");
    }

    proptest! {
        #[test]
        fn prop_throughput_non_negative(total in any::<u64>(), millis in 0u64..10_000_000) {
            match report_over(total, Duration::from_millis(millis)) {
                Some(rate) => {
                    prop_assert!(millis > 0);
                    prop_assert!(rate.kib_per_sec() >= 0.0);
                }
                None => prop_assert_eq!(millis, 0),
            }
        }
    }
}
