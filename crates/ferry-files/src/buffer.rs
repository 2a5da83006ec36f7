//! In-memory capture buffer for the receive path.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only byte buffer, written to disk exactly once.
///
/// [`TransferBuffer::persist`] consumes the buffer, so a capture cannot be
/// flushed twice or appended to after it has been saved.
#[derive(Debug, Default)]
pub struct TransferBuffer {
    data: Vec<u8>,
}

/// Result of persisting a [`TransferBuffer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedFile {
    /// Path the bytes were written to
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes: u64,
}

impl TransferBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Append bytes in arrival order
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Bytes held
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been appended
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View the captured bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write the whole buffer to `path` in one pass, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, written or synced.
    pub fn persist<P: AsRef<Path>>(self, path: P) -> io::Result<PersistedFile> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        file.write_all(&self.data)?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), bytes = self.data.len(), "Persisted capture");

        Ok(PersistedFile {
            path: path.to_path_buf(),
            bytes: self.data.len() as u64,
        })
    }
}
