//! Bounded in-process byte conduit.
//!
//! This crate provides a single-direction byte pipe for handing data from
//! one producer to one consumer inside a process, with bounded memory and
//! cooperative backpressure. It is the building block for loopback
//! channels and duplex test doubles.
//!
//! # Flow Control
//!
//! A [`Conduit`] has two thresholds (see [`ConduitConfig`]):
//!
//! - **pause threshold**: once the unread byte count reaches it, the
//!   conduit pauses and the next write is held; a write that goes past it
//!   is held itself
//! - **resume threshold**: a held write is released once reads bring the
//!   unread count back to or below it
//!
//! ```
//! use giztoy_conduit::Conduit;
//!
//! # tokio_test::block_on(async {
//! let conduit = Conduit::with_thresholds(50, 100).unwrap();
//! conduit.write(&[0u8; 100]).await.unwrap(); // reaches the pause threshold
//! assert_eq!(conduit.len(), 100);
//! // A further write would now be held until 50 or fewer bytes are unread.
//! # });
//! ```
//!
//! # Closing
//!
//! - `complete_writing()`: no more writes; the reader drains, then reads `Ok(0)`
//! - `dispose()`: terminal; every pending and future operation fails with
//!   [`ConduitError::Disposed`]
//!
//! # Cancellation
//!
//! `read_with_cancel` and `write_with_cancel` take a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and report
//! [`ConduitError::Cancelled`] if it fires while the call is suspended.
//!
//! # Adapters
//!
//! [`Conduit`] implements `std::io::{Read, Write}` (blocking) and
//! `tokio::io::{AsyncRead, AsyncWrite}`. [`duplex_pair`] wires two
//! conduits into a connected pair of bidirectional streams.

mod conduit;
mod config;
mod duplex;
mod error;
mod io;

pub use conduit::Conduit;
pub use config::*;
pub use duplex::{DuplexStream, duplex_pair, duplex_pair_with_config};
pub use error::{ConduitError, Result};
