//! Send and receive sessions.
//!
//! Each session owns its link for its whole life and closes it on every exit
//! path. Both loops are synchronous; the only place either one blocks is a
//! timeout-bounded link read or write.

pub mod receive;
pub mod send;

use crate::counters::SessionCounters;
use crate::observer::ProgressUpdate;
use crate::rate;
use std::time::Instant;

/// Progress snapshot of `counters` as of now.
pub(crate) fn progress(counters: &SessionCounters, expected_bytes: Option<u64>) -> ProgressUpdate {
    let now = Instant::now();
    ProgressUpdate {
        total_bytes: counters.total_bytes(),
        expected_bytes,
        elapsed: counters.elapsed_at(now),
        throughput: rate::sample(counters, now),
    }
}
