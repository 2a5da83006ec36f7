//! Cooperative stop for open-ended receives.
//!
//! A [`CancellationSource`] runs a [`StopTrigger`] on its own thread, checking
//! it once per poll interval. When the trigger fires, the listener sets the
//! session's [`CancellationToken`] and exits. The receive loop reads the token
//! between link reads; nothing ever interrupts a read in flight.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default interval between trigger checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Write-once stop flag shared between a session and its listener.
///
/// Setting it again after the first time changes nothing.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// New, unset token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token. Returns `true` only for the call that set it.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    /// Whether the token has been set
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A non-blocking check for the operator's stop signal.
///
/// `check` must return promptly: the listener does its own sleeping between
/// checks. Input that is not the stop signal is consumed and ignored.
pub trait StopTrigger: Send {
    /// Whether the stop signal has arrived since the last check.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be polled. The listener gives up
    /// on the first error.
    fn check(&mut self) -> io::Result<bool>;

    /// Short name for logs
    fn describe(&self) -> &'static str {
        "stop trigger"
    }
}

impl<T: StopTrigger + ?Sized> StopTrigger for Box<T> {
    fn check(&mut self) -> io::Result<bool> {
        (**self).check()
    }

    fn describe(&self) -> &'static str {
        (**self).describe()
    }
}

/// How a listener thread ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The trigger fired and the token was set
    Triggered,
    /// The session finished first and retired the listener
    Retired,
    /// The trigger reported an error; the token was left alone
    Failed,
}

/// Background observer of a [`StopTrigger`].
pub struct CancellationSource {
    trigger: Box<dyn StopTrigger>,
    interval: Duration,
}

impl CancellationSource {
    /// Source polling `trigger` every [`DEFAULT_POLL_INTERVAL`].
    pub fn new(trigger: impl StopTrigger + 'static) -> Self {
        Self {
            trigger: Box::new(trigger),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Change the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start listening on a new thread; the listener sets `token` when the
    /// trigger fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self, token: CancellationToken) -> io::Result<Listener> {
        let retired = Arc::new(AtomicBool::new(false));
        let retired_flag = Arc::clone(&retired);
        let Self {
            mut trigger,
            interval,
        } = self;

        let handle = thread::Builder::new()
            .name("ferry-stop-listener".into())
            .spawn(move || listen(trigger.as_mut(), interval, &token, &retired_flag))?;

        Ok(Listener { handle, retired })
    }
}

fn listen(
    trigger: &mut dyn StopTrigger,
    interval: Duration,
    token: &CancellationToken,
    retired: &AtomicBool,
) -> ListenerExit {
    tracing::debug!(
        trigger = trigger.describe(),
        interval_ms = interval.as_millis() as u64,
        "Stop listener started"
    );

    loop {
        if retired.load(Ordering::Acquire) {
            tracing::debug!("Stop listener retired");
            return ListenerExit::Retired;
        }

        let polled_at = Instant::now();
        match trigger.check() {
            Ok(true) => {
                token.cancel();
                tracing::info!(trigger = trigger.describe(), "Stop requested");
                return ListenerExit::Triggered;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    trigger = trigger.describe(),
                    error = %e,
                    "Stop listener failed; the receive can no longer be stopped by the operator"
                );
                return ListenerExit::Failed;
            }
        }

        if let Some(rest) = interval.checked_sub(polled_at.elapsed()) {
            thread::sleep(rest);
        }
    }
}

/// Running listener thread.
pub struct Listener {
    handle: JoinHandle<ListenerExit>,
    retired: Arc<AtomicBool>,
}

impl Listener {
    /// Ask the listener to exit at its next poll without touching the token.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Whether the listener thread has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the listener to end. Returns within one poll interval after
    /// [`Listener::retire`].
    pub fn join(self) -> ListenerExit {
        self.handle.join().unwrap_or(ListenerExit::Failed)
    }
}
