//! Sequential file chunking for the send path.
//!
//! The chunker reads until the OS reports end of file rather than trusting the
//! size captured at open, so a file that changes underneath a transfer is sent
//! as it reads, never padded or truncated to the original length.

use crate::DEFAULT_CHUNK_SIZE;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Source file reader yielding fixed-size chunks
pub struct FileChunker {
    file: File,
    path: PathBuf,
    chunk_size: usize,
    total_size: u64,
    bytes_read: u64,
    buffer: Vec<u8>,
}

impl FileChunker {
    /// Open a file for chunked reading
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero, or if the file cannot be
    /// opened or its metadata cannot be read.
    pub fn new<P: AsRef<Path>>(path: P, chunk_size: usize) -> io::Result<Self> {
        if chunk_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be positive",
            ));
        }

        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            chunk_size,
            total_size: metadata.len(),
            bytes_read: 0,
            buffer: Vec::with_capacity(chunk_size),
        })
    }

    /// Open a file with the default chunk size
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or metadata cannot be read.
    pub fn with_default_size<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::new(path, DEFAULT_CHUNK_SIZE)
    }

    /// Path the chunker was opened on
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get chunk size
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// File size at open time
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of chunks the file held at open time
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size as u64)
    }

    /// Bytes handed out so far
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fraction of the open-time size handed out, clamped to `0.0..=1.0`
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            return 1.0;
        }
        (self.bytes_read as f64 / self.total_size as f64).min(1.0)
    }

    /// Read the next chunk
    ///
    /// Returns `None` at end of file. Every chunk but the last is exactly
    /// `chunk_size` bytes. The slice is only valid until the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the file fails.
    pub fn read_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        self.buffer.clear();
        (&mut self.file)
            .take(self.chunk_size as u64)
            .read_to_end(&mut self.buffer)?;

        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.bytes_read += self.buffer.len() as u64;
        Ok(Some(self.buffer.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file_with(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_chunking_roundtrip() {
        let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
        let file = temp_file_with(&data);

        let mut chunker = FileChunker::new(file.path(), 1024).unwrap();
        assert_eq!(chunker.total_size(), 5000);
        assert_eq!(chunker.num_chunks(), 5);

        let mut out = Vec::new();
        let mut sizes = Vec::new();
        while let Some(chunk) = chunker.read_chunk().unwrap() {
            sizes.push(chunk.len());
            out.extend_from_slice(chunk);
        }

        assert_eq!(out, data);
        assert_eq!(sizes, vec![1024, 1024, 1024, 1024, 904]);
        assert_eq!(chunker.bytes_read(), 5000);
        assert_eq!(chunker.progress(), 1.0);
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        let file = temp_file_with(&[]);
        let mut chunker = FileChunker::with_default_size(file.path()).unwrap();
        assert_eq!(chunker.num_chunks(), 0);
        assert_eq!(chunker.progress(), 1.0);
        assert!(chunker.read_chunk().unwrap().is_none());
    }

    #[test]
    fn test_exact_multiple_of_chunk_size() {
        let file = temp_file_with(&[0x5A; 2048]);
        let mut chunker = FileChunker::new(file.path(), 1024).unwrap();
        assert_eq!(chunker.read_chunk().unwrap().map(<[u8]>::len), Some(1024));
        assert_eq!(chunker.read_chunk().unwrap().map(<[u8]>::len), Some(1024));
        assert!(chunker.read_chunk().unwrap().is_none());
    }

    #[test]
    fn test_partial_progress() {
        let file = temp_file_with(&[1u8; 4096]);
        let mut chunker = FileChunker::new(file.path(), 1024).unwrap();
        chunker.read_chunk().unwrap();
        assert!((chunker.progress() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_file_fails() {
        let result = FileChunker::with_default_size("/nonexistent/ferry/source.bin");
        assert_eq!(result.err().map(|e| e.kind()), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let file = temp_file_with(b"x");
        let err = FileChunker::new(file.path(), 0).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileChunker::with_default_size(dir.path()).is_err());
    }
}
