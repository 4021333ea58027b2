//! # Domain Errors
//!
//! This module defines the two recoverable error kinds of the access
//! contract: [`AccessError::OutOfBounds`] and [`AccessError::NotWritable`].
//! Everything else that can go wrong (open, truncate, map, flush) is an OS
//! failure and is surfaced as an `eyre::Report` wrapping the underlying
//! `std::io::Error` with file-path and operation context.
//!
//! ## Downcasting
//!
//! Domain errors travel inside `eyre::Report` like every other failure, but
//! remain typed so callers can react to the exact kind:
//!
//! ```ignore
//! match err.downcast_ref::<AccessError>() {
//!     Some(AccessError::OutOfBounds { .. }) => retry_with_smaller_range(),
//!     Some(AccessError::NotWritable) => reopen_writable(),
//!     None => return Err(err), // OS failure, propagate
//! }
//! ```

use thiserror::Error;

/// A recoverable violation of the access contract.
///
/// Both kinds are detected before any storage is touched, so a failed call
/// leaves the file unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The requested `[offset, offset + length)` range does not fit inside
    /// the handle's current size. Also raised when `offset + length`
    /// overflows `usize`.
    #[error("range [{offset}, {offset}+{length}) out of bounds (size={size})")]
    OutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },

    /// A mutating call was made on a handle or slice opened read-only.
    #[error("handle is not writable")]
    NotWritable,
}
