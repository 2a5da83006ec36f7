//! Scripted link used in tests to replay reads and capture writes.

use crate::error::{LinkError, Result};
use crate::Link;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted read outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Bytes that arrive; a short read buffer leaves the rest for the next read
    Data(Vec<u8>),
    /// A read that times out with nothing
    Idle,
    /// A read that fails with an I/O error of this kind
    Fail(io::ErrorKind),
}

impl ScriptStep {
    /// Convenience constructor for [`ScriptStep::Data`].
    pub fn data(bytes: impl AsRef<[u8]>) -> Self {
        Self::Data(bytes.as_ref().to_vec())
    }
}

#[derive(Default)]
struct Shared {
    written: Mutex<Vec<u8>>,
    exhausted: AtomicBool,
    closed: AtomicBool,
    reads: AtomicUsize,
}

/// Observer handle for a [`ScriptedLink`] that has been moved into a session.
#[derive(Clone)]
pub struct ScriptHandle {
    shared: Arc<Shared>,
}

impl ScriptHandle {
    /// Every byte written to the link so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.shared
            .written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Whether the link has replayed its whole script.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.shared.exhausted.load(Ordering::Acquire)
    }

    /// Whether the link has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of `read_chunk` calls served.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::Acquire)
    }
}

/// A link whose reads follow a fixed script.
///
/// Once the script runs out every read sleeps for the idle delay and
/// returns `Ok(0)`, like a quiet serial line.
pub struct ScriptedLink {
    script: VecDeque<ScriptStep>,
    idle_delay: Duration,
    write_limit: Option<usize>,
    open: bool,
    shared: Arc<Shared>,
}

impl ScriptedLink {
    /// Create a link that replays `script`.
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: script.into(),
            idle_delay: Duration::from_millis(5),
            write_limit: None,
            open: true,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Set how long an idle read blocks before returning `Ok(0)`.
    #[must_use]
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Fail any write that would take the total written past `limit` bytes.
    #[must_use]
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Handle for inspecting the link after it has been moved.
    #[must_use]
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn idle(&self) -> Result<usize> {
        std::thread::sleep(self.idle_delay);
        Ok(0)
    }
}

impl Link for ScriptedLink {
    fn name(&self) -> &str {
        "scripted"
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Err(LinkError::Closed);
        }
        self.shared.reads.fetch_add(1, Ordering::AcqRel);

        match self.script.front_mut() {
            None => {
                self.shared.exhausted.store(true, Ordering::Release);
                self.idle()
            }
            Some(ScriptStep::Idle) => {
                self.script.pop_front();
                self.idle()
            }
            Some(ScriptStep::Fail(kind)) => {
                let kind = *kind;
                self.script.pop_front();
                Err(LinkError::Port(io::Error::new(kind, "scripted read failure")))
            }
            Some(ScriptStep::Data(bytes)) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                bytes.drain(..n);
                if bytes.is_empty() {
                    self.script.pop_front();
                }
                Ok(n)
            }
        }
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        if !self.open {
            return Err(LinkError::Closed);
        }
        let mut written = self
            .shared
            .written
            .lock()
            .map_err(|_| LinkError::Port(io::Error::other("write log poisoned")))?;
        if let Some(limit) = self.write_limit
            && written.len() + data.len() > limit
        {
            return Err(LinkError::Port(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        written.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.open {
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.shared.closed.store(true, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for ScriptedLink {
    fn drop(&mut self) {
        self.close();
    }
}
