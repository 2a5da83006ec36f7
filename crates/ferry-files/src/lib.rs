//! # Ferry Files
//!
//! File side of a Ferry transfer.
//!
//! This crate provides:
//! - Sequential fixed-size chunking of the file being sent
//! - The append-only capture buffer a receive fills and persists once
//! - Timestamped default names for captures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod chunker;
pub mod naming;

pub use buffer::{PersistedFile, TransferBuffer};
pub use chunker::FileChunker;

/// Default chunk size (1 KiB).
///
/// Small enough that throughput updates stay frequent at low baud rates.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
