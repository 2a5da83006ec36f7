//! Send: stream a file out a link until end of file.

use super::progress;
use crate::counters::SessionCounters;
use crate::error::{Result, SessionError};
use crate::observer::TransferObserver;
use crate::rate::{self, Throughput};
use ferry_files::{DEFAULT_CHUNK_SIZE, FileChunker};
use ferry_link::Link;
use std::path::Path;
use std::time::{Duration, Instant};

/// Send session parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// Bytes read from the file and written to the link per step
    pub chunk_size: usize,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SendOptions {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidOptions`] for a zero chunk size.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SessionError::InvalidOptions(
                "chunk_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a completed send
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// Bytes written to the link
    pub bytes: u64,
    /// Size of the source file when the session opened it
    pub expected: u64,
    /// Time spent streaming
    pub elapsed: Duration,
    /// Average rate over the whole send
    pub throughput: Option<Throughput>,
}

/// One file streamed over one link.
///
/// There is no cancellation path: the session runs until end of file or
/// the first link error.
pub struct SendSession<L: Link> {
    link: L,
    chunker: FileChunker,
    counters: SessionCounters,
}

impl<L: Link> SendSession<L> {
    /// Open `path` for sending over `link`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::File`] if the file cannot be opened, and
    /// [`SessionError::InvalidOptions`] for a zero chunk size. The link is
    /// closed on either error.
    pub fn new<P: AsRef<Path>>(mut link: L, path: P, options: &SendOptions) -> Result<Self> {
        let path = path.as_ref();
        let opened = options
            .validate()
            .and_then(|()| {
                FileChunker::new(path, options.chunk_size)
                    .map_err(|e| SessionError::file(path, e))
            });

        match opened {
            Ok(chunker) => Ok(Self {
                link,
                chunker,
                counters: SessionCounters::new(),
            }),
            Err(e) => {
                link.close();
                Err(e)
            }
        }
    }

    /// Size of the source file
    #[must_use]
    pub fn expected_bytes(&self) -> u64 {
        self.chunker.total_size()
    }

    /// Stream the whole file, then flush and close the link.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::File`] if the file cannot be read, or
    /// [`SessionError::Link`] if a write or the final flush fails. The link is
    /// closed in every case.
    pub fn run<O: TransferObserver + ?Sized>(mut self, observer: &mut O) -> Result<SendReport> {
        let expected = self.chunker.total_size();
        tracing::info!(
            link = self.link.name(),
            file = %self.chunker.path().display(),
            bytes = expected,
            chunks = self.chunker.num_chunks(),
            "Starting send"
        );

        observer.on_start(Some(expected));
        self.counters = SessionCounters::new();

        let streamed = self.stream(observer, expected);
        self.link.close();
        streamed?;

        let elapsed = self.counters.elapsed_at(Instant::now());
        let bytes = self.counters.total_bytes();
        let throughput = rate::report_over(bytes, elapsed);
        tracing::info!(
            bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            throughput = ?throughput.map(|t| t.kib_per_sec()),
            "Send complete"
        );
        observer.on_finish(bytes);

        Ok(SendReport {
            bytes,
            expected,
            elapsed,
            throughput,
        })
    }

    fn stream<O: TransferObserver + ?Sized>(
        &mut self,
        observer: &mut O,
        expected: u64,
    ) -> Result<()> {
        let Self {
            link,
            chunker,
            counters,
        } = self;
        let path = chunker.path().to_path_buf();

        loop {
            let chunk = match chunker.read_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(SessionError::file(&path, e)),
            };

            link.write_chunk(chunk)?;
            let total = counters.record(chunk.len());
            tracing::trace!(chunk = chunk.len(), total, "Chunk sent");
            observer.on_progress(&progress(counters, Some(expected)));
        }

        link.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Silent;
    use crate::testing::Recorder;
    use ferry_link::LinkError;
    use ferry_link::scripted::ScriptedLink;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_send_writes_whole_file_in_order() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let file = source(&data);
        let link = ScriptedLink::new(Vec::new());
        let handle = link.handle();

        let session = SendSession::new(link, file.path(), &SendOptions::default()).unwrap();
        assert_eq!(session.expected_bytes(), 5000);

        let mut recorder = Recorder::default();
        let report = session.run(&mut recorder).unwrap();

        assert_eq!(report.bytes, 5000);
        assert_eq!(report.expected, 5000);
        assert_eq!(handle.written(), data);
        assert!(handle.is_closed());

        // 4 full chunks and one of 904 bytes
        assert_eq!(recorder.progress.len(), 5);
        assert_eq!(recorder.started, Some(Some(5000)));
        assert_eq!(recorder.finished, Some(5000));
        let last = recorder.progress.last().unwrap();
        assert_eq!(last.fraction(), Some(1.0));
    }

    #[test]
    fn test_progress_is_non_decreasing() {
        let file = source(&[7u8; 3000]);
        let session = SendSession::new(
            ScriptedLink::new(Vec::new()),
            file.path(),
            &SendOptions { chunk_size: 100 },
        )
        .unwrap();

        let mut recorder = Recorder::default();
        session.run(&mut recorder).unwrap();

        assert_eq!(recorder.progress.len(), 30);
        for pair in recorder.progress.windows(2) {
            assert!(pair[0].total_bytes <= pair[1].total_bytes);
        }
    }

    #[test]
    fn test_empty_file_sends_nothing() {
        let file = source(b"");
        let link = ScriptedLink::new(Vec::new());
        let handle = link.handle();

        let report = SendSession::new(link, file.path(), &SendOptions::default())
            .unwrap()
            .run(&mut Silent)
            .unwrap();

        assert_eq!(report.bytes, 0);
        assert!(handle.written().is_empty());
        assert!(handle.is_closed());
    }

    #[test]
    fn test_missing_file_closes_link() {
        let link = ScriptedLink::new(Vec::new());
        let handle = link.handle();

        let result = SendSession::new(link, "/nonexistent/ferry/source.bin", &SendOptions::default());
        assert!(matches!(result, Err(SessionError::File { .. })));
        assert!(handle.is_closed());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let file = source(b"data");
        let result = SendSession::new(
            ScriptedLink::new(Vec::new()),
            file.path(),
            &SendOptions { chunk_size: 0 },
        );
        assert!(matches!(result, Err(SessionError::InvalidOptions(_))));
    }

    #[test]
    fn test_write_failure_is_fatal_and_closes() {
        let file = source(&[1u8; 4096]);
        let link = ScriptedLink::new(Vec::new()).with_write_limit(2048);
        let handle = link.handle();

        let result = SendSession::new(link, file.path(), &SendOptions::default())
            .unwrap()
            .run(&mut Silent);

        assert!(matches!(result, Err(SessionError::Link(LinkError::Port(_)))));
        assert_eq!(handle.written().len(), 2048);
        assert!(handle.is_closed());
    }
}
