//! # Capability Traits
//!
//! The access contract is expressed as four orthogonal capability traits
//! composed per concrete type, rather than a deep interface hierarchy:
//!
//! | Trait       | Capability                            | Implemented by            |
//! |-------------|---------------------------------------|---------------------------|
//! | `Readable`  | size query, range reads, typed reads  | every backend and slice   |
//! | `Writable`  | range writes, typed writes            | every backend and slice   |
//! | `Syncable`  | best-effort flush to stable storage   | backends, concatenations  |
//! | `Resizable` | resize and structural insert/delete   | single-file backends only |
//!
//! Writability is a runtime flag fixed at open time, not a type-level
//! property: a read-only handle still implements `Writable`, and its
//! mutating calls fail with `AccessError::NotWritable`. Structural edits
//! are the exception: concatenations do not implement `Resizable` at all,
//! so cross-segment insert/delete is a compile error rather than a runtime
//! one.
//!
//! ## Typed access
//!
//! `read_value`/`write_value` move fixed-width values through the same
//! bounds-checked range primitives, using `zerocopy` bounds so any
//! plain-data type (integers, or `#[repr(C)]` structs deriving the zerocopy
//! traits) round-trips without hand-written serialization:
//!
//! ```ignore
//! file.write_value(&0xCAFE_F00Du32.to_le(), 16)?;
//! let raw: u32 = file.read_value(16)?;
//! ```

use eyre::{eyre, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::slice::{FileSlice, SliceMode};

/// Read access to a linearly addressable byte range.
pub trait Readable {
    /// Exact number of addressable bytes; offset 0 is the first byte.
    fn size(&self) -> usize;

    /// Reads exactly `buf.len()` bytes starting at `offset` into `buf`.
    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Reads exactly `length` bytes starting at `offset`.
    fn read_data(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads a fixed-width value from `offset`.
    fn read_value<T: FromBytes>(&self, offset: usize) -> Result<T>
    where
        Self: Sized,
    {
        let bytes = self.read_data(offset, std::mem::size_of::<T>())?;
        // The buffer length is exactly the type width, so this cannot fail.
        T::read_from_bytes(&bytes).map_err(|_| eyre!("typed read of {} bytes failed", bytes.len()))
    }
}

/// Write access to a linearly addressable byte range.
pub trait Writable: Readable {
    /// Whether the handle was opened with write permission.
    fn is_writable(&self) -> bool;

    /// Writes all of `bytes` starting at `offset`. The range must already
    /// lie inside the current size; writes never grow a file.
    fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()>;

    /// Writes a fixed-width value at `offset`.
    fn write_value<T: IntoBytes + Immutable>(&mut self, value: &T, offset: usize) -> Result<()>
    where
        Self: Sized,
    {
        self.write_data(value.as_bytes(), offset)
    }

    /// Takes a bounded window over `[offset, offset + length)`.
    ///
    /// The window borrows this handle mutably for its lifetime; see
    /// [`FileSlice`] for the two consistency policies.
    fn slice(&mut self, offset: usize, length: usize, mode: SliceMode) -> Result<FileSlice<'_, Self>>
    where
        Self: Sized,
    {
        FileSlice::new(self, offset, length, mode)
    }
}

/// Flushing buffered state to stable storage.
pub trait Syncable {
    /// Best-effort flush. Errors are deliberately dropped; this is the one
    /// place in the contract where failure is not reported.
    fn sync(&self);
}

/// Structural mutation: absolute resize plus insert/delete, which shift
/// every byte past the edit point.
pub trait Resizable: Writable {
    /// Sets the absolute length to `new_size`, extending with zero bytes or
    /// truncating, including to exactly 0.
    fn resize(&mut self, new_size: usize) -> Result<()>;

    /// Grows the file by `bytes.len()` and places `bytes` at `offset`,
    /// shifting the tail `[offset, size)` forward. `offset == size`
    /// appends.
    fn insert_data(&mut self, bytes: &[u8], offset: usize) -> Result<()>;

    /// Removes `[offset, offset + length)`, shifting the tail back and
    /// shrinking the file by `length`.
    fn delete_range(&mut self, offset: usize, length: usize) -> Result<()>;
}
