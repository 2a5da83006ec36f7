//! Enter-key stop triggers for the receive listener.
//!
//! Two ways of watching for Enter, picked once at startup:
//! - [`ConsoleKeyTrigger`] polls console key events through crossterm
//! - [`StdinLineTrigger`] polls standard input for a complete line
//!
//! Both are non-blocking: a check returns at once whether or not input is
//! waiting, and throws away any input that is not the stop key.

use clap::ValueEnum;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ferry_core::StopTrigger;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

/// How the stop key is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerMode {
    /// Console key events on Windows, line-buffered stdin elsewhere
    #[default]
    Auto,
    /// Console key events
    Console,
    /// Line-buffered standard input
    Stdin,
}

impl ListenerMode {
    /// Replace `Auto` with the mode for this platform.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(windows) => Self::Console,
            Self::Auto => Self::Stdin,
            other => other,
        }
    }
}

impl fmt::Display for ListenerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Console => "console",
            Self::Stdin => "stdin",
        })
    }
}

impl FromStr for ListenerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Build the trigger for `mode`.
pub fn stop_trigger(mode: ListenerMode) -> io::Result<Box<dyn StopTrigger>> {
    let resolved = mode.resolve();
    tracing::debug!(requested = %mode, resolved = %resolved, "Selected stop listener");
    Ok(match resolved {
        ListenerMode::Console => Box::new(ConsoleKeyTrigger::new()),
        _ => Box::new(StdinLineTrigger::new()?),
    })
}

/// Watches console key events for Enter.
///
/// Outside Windows the terminal has to be in raw mode for single key events
/// to arrive. Raw mode is entered on the first check, after any prompts, and
/// left when the trigger is dropped.
#[derive(Debug, Default)]
pub struct ConsoleKeyTrigger {
    raw_mode: bool,
}

impl ConsoleKeyTrigger {
    /// Watch the console.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StopTrigger for ConsoleKeyTrigger {
    fn check(&mut self) -> io::Result<bool> {
        if !self.raw_mode && !cfg!(windows) {
            crossterm::terminal::enable_raw_mode()?;
            self.raw_mode = true;
        }
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && key.code == KeyCode::Enter
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn describe(&self) -> &'static str {
        "console key"
    }
}

impl Drop for ConsoleKeyTrigger {
    fn drop(&mut self) {
        if self.raw_mode
            && let Err(e) = crossterm::terminal::disable_raw_mode()
        {
            tracing::warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

/// True if `input` completes a line.
#[cfg_attr(not(unix), allow(dead_code))]
fn ends_line(input: &[u8]) -> bool {
    input.iter().any(|&b| b == b'\n' || b == b'\r')
}

#[cfg(unix)]
pub use self::unix::StdinLineTrigger;

#[cfg(not(unix))]
pub use self::fallback::StdinLineTrigger;

#[cfg(unix)]
mod unix {
    use super::ends_line;
    use ferry_core::StopTrigger;
    use std::io;

    /// Watches standard input for a complete line.
    ///
    /// Readiness is polled with `poll(2)` and the bytes are taken straight off
    /// the descriptor, so a check never waits on a half-typed line.
    ///
    /// The prompts read through std's buffered `Stdin`. Input that was
    /// already pulled into that buffer, such as a line typed ahead of a
    /// prompt or the rest of a piped file, is never seen here. Once stdin
    /// reaches end of file the check fails and the listener stops watching,
    /// so a receive fed from a pipe or `/dev/null` runs until the link fails
    /// or the process is interrupted. Use the console listener there.
    pub struct StdinLineTrigger {
        fd: libc::c_int,
    }

    impl StdinLineTrigger {
        /// Watch the process's standard input.
        pub fn new() -> io::Result<Self> {
            Ok(Self::on_fd(libc::STDIN_FILENO))
        }

        /// Watch an already open descriptor. The caller keeps it open.
        pub(super) fn on_fd(fd: libc::c_int) -> Self {
            Self { fd }
        }

        fn readable(&self) -> io::Result<bool> {
            let mut pollfd = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: poll is given one valid, initialized pollfd and a count
            // of 1; a zero timeout makes it return immediately.
            let ready = unsafe { libc::poll(&mut pollfd, 1, 0) };
            match ready {
                -1 => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        Ok(false)
                    } else {
                        Err(err)
                    }
                }
                0 => Ok(false),
                _ => Ok(pollfd.revents & (libc::POLLIN | libc::POLLHUP) != 0),
            }
        }
    }

    impl StopTrigger for StdinLineTrigger {
        fn check(&mut self) -> io::Result<bool> {
            while self.readable()? {
                let mut buf = [0u8; 256];
                // SAFETY: buf is a live stack buffer of buf.len() bytes and
                // poll reported the descriptor readable, so read returns
                // without blocking.
                let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
                match n {
                    -1 => {
                        let err = io::Error::last_os_error();
                        if err.kind() != io::ErrorKind::Interrupted {
                            return Err(err);
                        }
                    }
                    0 => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "standard input closed",
                        ));
                    }
                    n if ends_line(&buf[..n as usize]) => return Ok(true),
                    _ => {}
                }
            }
            Ok(false)
        }

        fn describe(&self) -> &'static str {
            "stdin line"
        }
    }
}

/// Runs a blocking line read on a helper thread and reports what it saw.
///
/// The thread is started by the first check, so prompts shown before the
/// listener starts still get their answers. It is left behind, blocked on
/// its read, when the receive ends.
#[cfg(any(not(unix), test))]
mod threaded {
    use ferry_core::StopTrigger;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU8, Ordering};

    const WAITING: u8 = 0;
    const LINE: u8 = 1;
    const CLOSED: u8 = 2;

    type LineRead = Box<dyn FnOnce() -> io::Result<usize> + Send>;

    pub struct ThreadedLineTrigger {
        read_line: Option<LineRead>,
        seen: Arc<AtomicU8>,
    }

    impl ThreadedLineTrigger {
        /// `read_line` blocks until a line arrives and returns its length,
        /// zero at end of input.
        pub fn new(read_line: impl FnOnce() -> io::Result<usize> + Send + 'static) -> Self {
            Self {
                read_line: Some(Box::new(read_line)),
                seen: Arc::new(AtomicU8::new(WAITING)),
            }
        }

        fn start(&mut self) -> io::Result<()> {
            let Some(read_line) = self.read_line.take() else {
                return Ok(());
            };
            let writer = Arc::clone(&self.seen);
            std::thread::Builder::new()
                .name("ferry-stdin".into())
                .spawn(move || {
                    let outcome = match read_line() {
                        Ok(0) | Err(_) => CLOSED,
                        Ok(_) => LINE,
                    };
                    writer.store(outcome, Ordering::Release);
                })?;
            Ok(())
        }
    }

    impl StopTrigger for ThreadedLineTrigger {
        fn check(&mut self) -> io::Result<bool> {
            self.start()?;
            match self.seen.load(Ordering::Acquire) {
                LINE => Ok(true),
                CLOSED => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "standard input closed",
                )),
                _ => Ok(false),
            }
        }

        fn describe(&self) -> &'static str {
            "stdin line"
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use super::threaded::ThreadedLineTrigger;
    use ferry_core::StopTrigger;
    use std::io;

    /// Watches standard input for a complete line.
    ///
    /// Without `poll(2)` the line is read on a helper thread through the same
    /// buffered handle the prompts use, so typed-ahead input is seen.
    pub struct StdinLineTrigger(ThreadedLineTrigger);

    impl StdinLineTrigger {
        /// Watch the process's standard input.
        pub fn new() -> io::Result<Self> {
            Ok(Self(ThreadedLineTrigger::new(|| {
                let mut line = String::new();
                io::stdin().read_line(&mut line)
            })))
        }
    }

    impl StopTrigger for StdinLineTrigger {
        fn check(&mut self) -> io::Result<bool> {
            self.0.check()
        }

        fn describe(&self) -> &'static str {
            self.0.describe()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_per_platform() {
        let resolved = ListenerMode::Auto.resolve();
        if cfg!(windows) {
            assert_eq!(resolved, ListenerMode::Console);
        } else {
            assert_eq!(resolved, ListenerMode::Stdin);
        }
        assert_eq!(ListenerMode::Console.resolve(), ListenerMode::Console);
        assert_eq!(ListenerMode::Stdin.resolve(), ListenerMode::Stdin);
    }

    #[test]
    fn test_mode_parses_and_displays() {
        for mode in [ListenerMode::Auto, ListenerMode::Console, ListenerMode::Stdin] {
            assert_eq!(mode.to_string().parse::<ListenerMode>().unwrap(), mode);
        }
        assert_eq!("STDIN".parse::<ListenerMode>().unwrap(), ListenerMode::Stdin);
        assert!("keyboard".parse::<ListenerMode>().is_err());
    }

    #[test]
    fn test_mode_in_toml() {
        #[derive(Deserialize, Serialize)]
        struct Wrapper {
            mode: ListenerMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"console\"").unwrap();
        assert_eq!(parsed.mode, ListenerMode::Console);
        let text = toml::to_string(&Wrapper { mode: ListenerMode::Stdin }).unwrap();
        assert_eq!(text.trim(), "mode = \"stdin\"");
    }

    #[test]
    fn test_threaded_trigger_waits_for_first_check() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Instant;

        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let mut trigger = threaded::ThreadedLineTrigger::new(move || {
            flag.store(true, Ordering::Release);
            Ok(1)
        });

        // Nothing may read input while prompts are still being answered
        std::thread::sleep(Duration::from_millis(50));
        assert!(!started.load(Ordering::Acquire));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !trigger.check().unwrap() {
            assert!(Instant::now() < deadline, "line never reported");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(started.load(Ordering::Acquire));
    }

    #[test]
    fn test_threaded_trigger_reports_end_of_input() {
        use std::time::Instant;

        let mut trigger = threaded::ThreadedLineTrigger::new(|| Ok(0));
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match trigger.check() {
                Ok(false) => {
                    assert!(Instant::now() < deadline, "end of input never reported");
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok(true) => panic!("end of input reported as a line"),
                Err(e) => {
                    assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
                    break;
                }
            }
        }
    }

    #[cfg(unix)]
    fn pipe() -> (libc::c_int, libc::c_int) {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: fds has room for the two descriptors pipe writes.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    #[cfg(unix)]
    fn write_fd(fd: libc::c_int, bytes: &[u8]) {
        // SAFETY: bytes is a live slice of bytes.len() bytes.
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        assert_eq!(n, bytes.len() as isize);
    }

    #[cfg(unix)]
    fn close_fd(fd: libc::c_int) {
        // SAFETY: fd came from pipe() and is closed once.
        unsafe { libc::close(fd) };
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_trigger_fires_on_complete_line() {
        let (read_end, write_end) = pipe();
        let mut trigger = StdinLineTrigger::on_fd(read_end);

        assert!(!trigger.check().unwrap());
        write_fd(write_end, b"partial");
        assert!(!trigger.check().unwrap());
        write_fd(write_end, b"\n");
        assert!(trigger.check().unwrap());

        close_fd(write_end);
        close_fd(read_end);
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_trigger_fails_at_end_of_input() {
        let (read_end, write_end) = pipe();
        let mut trigger = StdinLineTrigger::on_fd(read_end);

        close_fd(write_end);
        let err = trigger.check().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        close_fd(read_end);
    }

    #[test]
    fn test_line_detection() {
        assert!(ends_line(b"\n"));
        assert!(ends_line(b"abc\r\n"));
        assert!(ends_line(b"\r"));
        assert!(!ends_line(b"abc"));
        assert!(!ends_line(b""));
    }
}
