//! # Ferry Core
//!
//! Transfer session engine for Ferry.
//!
//! This crate provides:
//! - [`SendSession`]: stream a file out a link chunk by chunk until end of file
//! - [`ReceiveSession`]: capture a link into memory until the operator stops it,
//!   then persist the capture in one write
//! - [`CancellationSource`]: a background listener that flips a
//!   [`CancellationToken`] when its [`StopTrigger`] fires
//! - Throughput metering alongside both loops
//!
//! # Receive states
//!
//! ```text
//! Idle -> DrainOffer -> AwaitFirstByte -> Streaming -> Stopped -> Persisted
//! ```
//!
//! The only suspension point of either loop is a timeout-bounded link read
//! or write. The stop flag is checked between reads, so a stop request is
//! seen within one read timeout plus one listener poll interval.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod counters;
pub mod error;
pub mod observer;
pub mod rate;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::{CancellationSource, CancellationToken, ListenerExit, StopTrigger};
pub use counters::SessionCounters;
pub use error::{Result, SessionError};
pub use observer::{ProgressUpdate, ReceiveObserver, Silent, TransferObserver};
pub use rate::Throughput;
pub use session::receive::{ReceiveOptions, ReceiveReport, ReceiveSession, ReceiveState};
pub use session::send::{SendOptions, SendReport, SendSession};
