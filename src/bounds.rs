//! # Bounds Policy
//!
//! Shared validation rules used by every backend. Each read/write/insert/
//! delete entry point calls [`check_range`] (and, for mutations,
//! [`check_writable`]) before touching storage, so a rejected call never
//! leaves a partially applied change behind.
//!
//! Offsets and lengths are `usize`, which makes non-negativity a type-level
//! fact; only the upper-bound check and the `offset + length` overflow case
//! remain to be validated at runtime.

use crate::error::AccessError;

/// Validates that `[offset, offset + length)` lies inside `size` bytes.
///
/// `offset == size` with `length == 0` is valid; it addresses the empty
/// range at end of file, which is the append position for inserts.
pub fn check_range(offset: usize, length: usize, size: usize) -> Result<(), AccessError> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(AccessError::OutOfBounds {
            offset,
            length,
            size,
        }),
    }
}

/// Validates that a handle's write flag permits mutation.
pub fn check_writable(writable: bool) -> Result<(), AccessError> {
    if writable {
        Ok(())
    } else {
        Err(AccessError::NotWritable)
    }
}
