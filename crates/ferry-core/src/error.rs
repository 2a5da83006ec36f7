//! Error types for transfer sessions

use crate::session::receive::ReceiveState;
use ferry_link::LinkError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that end a transfer session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The link could not be opened or failed before any capture existed
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The source file could not be read or the capture could not be written
    #[error("File error on {}: {source}", .path.display())]
    File {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The link failed mid-capture
    #[error("Link failed after {bytes} bytes: {source}")]
    Interrupted {
        /// Link failure that ended the capture
        source: LinkError,
        /// Where the partial capture was saved, if it was
        saved_to: Option<PathBuf>,
        /// Bytes captured before the failure
        bytes: u64,
    },

    /// The stop listener thread could not be started
    #[error("Stop listener failed to start: {0}")]
    Listener(std::io::Error),

    /// Options no session can run with
    #[error("Invalid session options: {0}")]
    InvalidOptions(String),

    /// A receive session is single-use
    #[error("Receive session already ran (state {0:?})")]
    AlreadyRun(ReceiveState),
}

impl SessionError {
    pub(crate) fn file(path: &Path, source: std::io::Error) -> Self {
        Self::File {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
