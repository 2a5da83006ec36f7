//! Receive: capture a link into memory until the operator stops it.
//!
//! The session moves through its states strictly forward:
//!
//! ```text
//! Idle -> DrainOffer -> AwaitFirstByte -> Streaming -> Stopped -> Persisted
//! ```
//!
//! Bytes that were queued on the port before the session started are read
//! once, up to [`DRAIN_LIMIT`], and offered to the observer. Everything read
//! after that is kept, in arrival order, including bytes read in the same
//! timeout window as the stop request.

use super::progress;
use crate::cancel::{CancellationSource, CancellationToken};
use crate::counters::SessionCounters;
use crate::error::{Result, SessionError};
use crate::observer::ReceiveObserver;
use crate::rate::{self, Throughput};
use ferry_files::{DEFAULT_CHUNK_SIZE, TransferBuffer};
use ferry_link::{Link, LinkError};
use std::mem;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Largest pending prefix read when the link opens
pub const DRAIN_LIMIT: usize = 2048;

/// Where a receive session is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReceiveState {
    /// Created, not yet run
    Idle,
    /// Reading and offering bytes queued before the session started
    DrainOffer,
    /// Listener running, reading one byte at a time
    AwaitFirstByte,
    /// Reading full chunks
    Streaming,
    /// Stop request observed, no further reads
    Stopped,
    /// Capture written to its destination
    Persisted,
}

/// Receive session parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Largest read once streaming
    pub chunk_size: usize,
    /// Largest read of pending bytes at startup
    pub drain_limit: usize,
    /// Save what was captured when the link fails mid-stream
    pub persist_on_error: bool,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            drain_limit: DRAIN_LIMIT,
            persist_on_error: true,
        }
    }
}

impl ReceiveOptions {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidOptions`] for a zero chunk size or
    /// drain limit.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SessionError::InvalidOptions(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.drain_limit == 0 {
            return Err(SessionError::InvalidOptions(
                "drain_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a persisted receive
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveReport {
    /// File the capture was written to
    pub path: PathBuf,
    /// Bytes written, including any kept pending prefix
    pub bytes: u64,
    /// Size of the pending prefix that was kept
    pub kept_pending: u64,
    /// Time from the first streamed byte to the stop
    pub elapsed: Duration,
    /// Average rate over `elapsed`
    pub throughput: Option<Throughput>,
}

/// One capture from one link into one file.
///
/// A session runs once. It closes its link before persisting and on every
/// error path.
pub struct ReceiveSession<L: Link> {
    link: L,
    destination: PathBuf,
    options: ReceiveOptions,
    buffer: TransferBuffer,
    counters: SessionCounters,
    token: CancellationToken,
    state: ReceiveState,
}

impl<L: Link> ReceiveSession<L> {
    /// Prepare a capture from `link` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidOptions`] if `options` do not validate;
    /// the link is closed.
    pub fn new(
        mut link: L,
        destination: impl Into<PathBuf>,
        options: ReceiveOptions,
    ) -> Result<Self> {
        if let Err(e) = options.validate() {
            link.close();
            return Err(e);
        }

        Ok(Self {
            link,
            destination: destination.into(),
            buffer: TransferBuffer::with_capacity(options.chunk_size),
            options,
            counters: SessionCounters::new(),
            token: CancellationToken::new(),
            state: ReceiveState::Idle,
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ReceiveState {
        self.state
    }

    /// Handle to this session's stop flag.
    ///
    /// Setting it has the same effect as the listener firing.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run the capture to completion.
    ///
    /// Blocks until a stop request is observed, then writes the whole
    /// capture to the destination, replacing any existing file.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyRun`] if the session has already been run
    /// - [`SessionError::Link`] if the link fails before anything is captured
    /// - [`SessionError::Interrupted`] if it fails after; the partial capture
    ///   is saved first when `persist_on_error` is set
    /// - [`SessionError::Listener`] if the stop listener cannot start
    /// - [`SessionError::File`] if the capture cannot be written
    pub fn run<O: ReceiveObserver + ?Sized>(
        &mut self,
        source: CancellationSource,
        observer: &mut O,
    ) -> Result<ReceiveReport> {
        if self.state != ReceiveState::Idle {
            return Err(SessionError::AlreadyRun(self.state));
        }

        tracing::info!(
            link = self.link.name(),
            destination = %self.destination.display(),
            "Starting receive"
        );
        observer.on_start(None);
        self.counters = SessionCounters::new();

        let kept_pending = match self.drain_offer(observer) {
            Ok(kept) => kept,
            Err(e) => {
                self.link.close();
                return Err(self.salvage(e));
            }
        };

        let listener = match source.spawn(self.token.clone()) {
            Ok(listener) => listener,
            Err(e) => {
                self.link.close();
                return Err(SessionError::Listener(e));
            }
        };
        self.transition(ReceiveState::AwaitFirstByte);
        observer.on_listening();

        let streamed = self.stream(observer);

        listener.retire();
        let exit = listener.join();
        tracing::debug!(?exit, "Stop listener joined");
        self.link.close();

        if let Err(e) = streamed {
            return Err(self.salvage(e));
        }
        self.persist(observer, kept_pending)
    }

    fn transition(&mut self, next: ReceiveState) {
        tracing::debug!(from = ?self.state, to = ?next, "Receive state");
        self.state = next;
    }

    /// Single bounded read of whatever was queued before the session began.
    fn drain_offer<O: ReceiveObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> std::result::Result<u64, LinkError> {
        self.transition(ReceiveState::DrainOffer);

        let mut pending = vec![0u8; self.options.drain_limit];
        let n = self.link.read_chunk(&mut pending)?;
        if n == 0 {
            tracing::debug!("No pending bytes on the link");
            return Ok(0);
        }

        let pending = &pending[..n];
        if observer.offer_pending(pending) {
            self.buffer.append(pending);
            self.counters.record(n);
            tracing::info!(bytes = n, "Kept pending bytes");
            Ok(n as u64)
        } else {
            tracing::info!(bytes = n, "Discarded pending bytes");
            Ok(0)
        }
    }

    fn stream<O: ReceiveObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> std::result::Result<(), LinkError> {
        let mut chunk = vec![0u8; self.options.chunk_size];

        while !self.token.is_cancelled() {
            if self.state == ReceiveState::AwaitFirstByte {
                let n = self.link.read_chunk(&mut chunk[..1])?;
                if n == 0 {
                    continue;
                }
                self.buffer.append(&chunk[..n]);
                self.counters.record(n);
                self.counters.mark_first_byte(Instant::now());
                self.transition(ReceiveState::Streaming);
                observer.on_first_byte();
                continue;
            }

            let n = self.link.read_chunk(&mut chunk)?;
            if n == 0 {
                continue;
            }
            self.buffer.append(&chunk[..n]);
            let total = self.counters.record(n);
            tracing::trace!(chunk = n, total, "Chunk received");
            observer.on_progress(&progress(&self.counters, None));
        }

        self.transition(ReceiveState::Stopped);
        let total = self.counters.total_bytes();
        tracing::info!(bytes = total, "Receive stopped");
        observer.on_stopped(total);
        Ok(())
    }

    fn persist<O: ReceiveObserver + ?Sized>(
        &mut self,
        observer: &mut O,
        kept_pending: u64,
    ) -> Result<ReceiveReport> {
        let elapsed = self.counters.elapsed_at(Instant::now());
        let buffer = mem::take(&mut self.buffer);
        let saved = buffer
            .persist(&self.destination)
            .map_err(|e| SessionError::file(&self.destination, e))?;

        self.transition(ReceiveState::Persisted);
        let throughput = if self.counters.first_byte_received() {
            rate::report_over(saved.bytes, elapsed)
        } else {
            None
        };
        tracing::info!(
            path = %saved.path.display(),
            bytes = saved.bytes,
            throughput = ?throughput.map(|t| t.kib_per_sec()),
            "Capture saved"
        );
        observer.on_finish(saved.bytes);

        Ok(ReceiveReport {
            path: saved.path,
            bytes: saved.bytes,
            kept_pending,
            elapsed,
            throughput,
        })
    }

    /// Turn a link failure into the session error, saving the partial
    /// capture first when configured to.
    fn salvage(&mut self, source: LinkError) -> SessionError {
        if self.buffer.is_empty() {
            return SessionError::Link(source);
        }

        let bytes = self.buffer.len() as u64;
        let saved_to = if self.options.persist_on_error {
            match mem::take(&mut self.buffer).persist(&self.destination) {
                Ok(saved) => {
                    tracing::warn!(
                        path = %saved.path.display(),
                        bytes,
                        error = %source,
                        "Link failed; partial capture saved"
                    );
                    Some(saved.path)
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.destination.display(),
                        error = %e,
                        "Link failed and the partial capture could not be saved"
                    );
                    None
                }
            }
        } else {
            tracing::warn!(bytes, error = %source, "Link failed; partial capture discarded");
            None
        };

        SessionError::Interrupted {
            source,
            saved_to,
            bytes,
        }
    }
}
