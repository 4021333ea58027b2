//! # spanfile - Uniform Random-Access File I/O
//!
//! spanfile gives every on-disk file the same random-access contract
//! (bounds-checked reads and writes, absolute resize, structural
//! insert/delete) through two interchangeable backends, and composes that
//! contract across multiple files and bounded windows:
//!
//! - [`StreamedFile`]: explicit seek/read/write syscalls per operation
//! - [`MappedFile`]: a shared memory mapping served by slice copies, with
//!   remap-on-resize and overlap-safe tail shifts
//! - [`ConcatenatedStreamedFile`] / [`ConcatenatedMappedFile`]: an ordered
//!   set of independent files presented as one logically contiguous
//!   virtual file
//! - [`FileSlice`]: a bounded window over any backend, forwarding directly
//!   or operating on a private buffer reconciled on demand
//!
//! ## Quick Start
//!
//! ```ignore
//! use spanfile::{MappedFile, Readable, Resizable, Writable};
//!
//! let mut file = MappedFile::open("data.bin", true)?;
//! file.write_data(b"header", 0)?;
//! file.insert_data(b"payload", 6)?;
//! let magic: u32 = file.read_value(0)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   FileSlice (direct / buffered windows)      │
//! ├─────────────────────────────────────────────┤
//! │   ConcatenatedFile<F> (segment routing)      │
//! ├──────────────────────┬──────────────────────┤
//! │   StreamedFile       │   MappedFile          │
//! │   (seek + io calls)  │   (shared mapping)    │
//! ├──────────────────────┴──────────────────────┤
//! │   capability traits + shared bounds policy   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Higher layers depend only on the capability traits ([`Readable`],
//! [`Writable`], [`Syncable`], [`Resizable`]), never on backend internals,
//! so slices compose over single files, concatenations, and other slices
//! alike.
//!
//! ## Ownership Model
//!
//! One handle owns one descriptor (plus, for mapped files, one mapping) and
//! is single-threaded: no internal locking is performed, and concurrent use
//! requires external serialization. Operations that can remap take
//! `&mut self`, so the borrow checker rules out stale references into a
//! moved mapping at compile time.
//!
//! ## Errors
//!
//! The two recoverable domain kinds, [`AccessError::OutOfBounds`] and
//! [`AccessError::NotWritable`], are typed and downcastable from the
//! `eyre::Report` every fallible operation returns; OS failures carry
//! file-path and operation context. `sync()` alone is best-effort and
//! reports nothing.
//!
//! ## Module Overview
//!
//! - [`bounds`]: the shared range/writability validation policy
//! - [`traits`]: the capability traits and typed fixed-width access
//! - [`streamed`]: the syscall backend
//! - [`mapped`]: the memory-mapped backend
//! - [`concat`]: multi-file concatenation and segment routing
//! - [`slice`]: direct and buffered window views

pub mod bounds;
pub mod concat;
pub mod error;
pub mod mapped;
pub mod slice;
pub mod streamed;
pub mod traits;

pub use concat::{ConcatenatedFile, ConcatenatedMappedFile, ConcatenatedStreamedFile, Segment};
pub use error::AccessError;
pub use mapped::MappedFile;
pub use slice::{FileSlice, SliceMode};
pub use streamed::StreamedFile;
pub use traits::{Readable, Resizable, Syncable, Writable};
