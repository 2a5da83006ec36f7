//! Triggers and observers shared by the unit tests.

use crate::cancel::StopTrigger;
use crate::observer::{ProgressUpdate, ReceiveObserver, TransferObserver};
use ferry_link::scripted::ScriptHandle;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Fires a [`FlagTrigger`] from the test thread.
#[derive(Clone)]
pub(crate) struct Fire(Arc<AtomicBool>);

impl Fire {
    pub(crate) fn fire(&self) {
        self.0.store(true, Ordering::Release);
    }
}

enum Condition {
    Flag(Arc<AtomicBool>),
    Exhausted(ScriptHandle),
}

/// Trigger that fires on a flag, or once a scripted link has nothing left.
pub(crate) struct FlagTrigger {
    condition: Condition,
    checks: Arc<AtomicUsize>,
}

impl FlagTrigger {
    pub(crate) fn new() -> (Self, Fire) {
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = Self {
            condition: Condition::Flag(Arc::clone(&flag)),
            checks: Arc::default(),
        };
        (trigger, Fire(flag))
    }

    pub(crate) fn when_exhausted(handle: ScriptHandle) -> Self {
        Self {
            condition: Condition::Exhausted(handle),
            checks: Arc::default(),
        }
    }

    pub(crate) fn checks(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.checks)
    }
}

impl StopTrigger for FlagTrigger {
    fn check(&mut self) -> io::Result<bool> {
        self.checks.fetch_add(1, Ordering::AcqRel);
        Ok(match &self.condition {
            Condition::Flag(flag) => flag.load(Ordering::Acquire),
            Condition::Exhausted(handle) => handle.is_exhausted(),
        })
    }

    fn describe(&self) -> &'static str {
        "test flag"
    }
}

/// Observer that records every call.
#[derive(Default)]
pub(crate) struct Recorder {
    pub keep_pending: bool,
    pub started: Option<Option<u64>>,
    pub progress: Vec<ProgressUpdate>,
    pub finished: Option<u64>,
    pub offered: Vec<Vec<u8>>,
    pub listening: bool,
    pub first_bytes: usize,
    pub stopped: Option<u64>,
}

impl Recorder {
    pub(crate) fn keeping(keep_pending: bool) -> Self {
        Self {
            keep_pending,
            ..Self::default()
        }
    }
}

impl TransferObserver for Recorder {
    fn on_start(&mut self, expected_bytes: Option<u64>) {
        self.started = Some(expected_bytes);
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.progress.push(*update);
    }

    fn on_finish(&mut self, total_bytes: u64) {
        self.finished = Some(total_bytes);
    }
}

impl ReceiveObserver for Recorder {
    fn offer_pending(&mut self, pending: &[u8]) -> bool {
        self.offered.push(pending.to_vec());
        self.keep_pending
    }

    fn on_listening(&mut self) {
        self.listening = true;
    }

    fn on_first_byte(&mut self) {
        self.first_bytes += 1;
    }

    fn on_stopped(&mut self, total_bytes: u64) {
        self.stopped = Some(total_bytes);
    }
}
