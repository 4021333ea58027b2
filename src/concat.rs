//! # Multi-File Concatenation
//!
//! `ConcatenatedFile<F>` presents an ordered list of independent files as
//! one logically contiguous virtual file. Each backing file becomes a
//! [`Segment`] covering `[logical_offset, logical_offset + size)` of the
//! virtual range; segments are contiguous and non-overlapping, and the
//! virtual size is the sum of the segment sizes.
//!
//! The router is generic over the backend: `ConcatenatedStreamedFile` and
//! `ConcatenatedMappedFile` are the two instantiations, and both share the
//! same translation logic because the capability traits are the only
//! contract the router needs.
//!
//! ## Offset Translation
//!
//! Segment starts are sorted, so a logical offset resolves to its segment
//! by binary search. A range contained in one segment forwards to that
//! segment in a single call; a range crossing segment boundaries iterates,
//! splitting the buffer per segment.
//!
//! ## Partial-Open Cleanup
//!
//! Opening N files can fail at any step. Every handle opened so far lives
//! in the partially built segment list, and each handle owns its descriptor
//! and mapping, so the failure path drops the list and releases exactly the
//! resources acquired so far. No leak is possible on any exit path.
//!
//! ## Scope Limit
//!
//! Structural edits (`resize`/`insert_data`/`delete_range`) are not
//! supported on concatenations: shifting bytes across file boundaries would
//! rewrite segment boundaries. The type simply does not implement
//! `Resizable`, so misuse is a compile error. Callers needing structural
//! edits open the individual backing file with a single-file backend.

use std::path::Path;

use eyre::Result;
use smallvec::SmallVec;

use crate::bounds::{check_range, check_writable};
use crate::error::AccessError;
use crate::mapped::MappedFile;
use crate::streamed::StreamedFile;
use crate::traits::{Readable, Syncable, Writable};

/// One backing file's sub-range within the virtual file.
#[derive(Debug)]
pub struct Segment<F> {
    logical_offset: usize,
    size: usize,
    file: F,
}

impl<F> Segment<F> {
    /// First virtual offset covered by this segment.
    pub fn logical_offset(&self) -> usize {
        self.logical_offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The backing handle. Read access only: structurally editing a backing
    /// file while it is part of a concatenation would desynchronize the
    /// segment bookkeeping, so mutation goes through the concatenation.
    pub fn file(&self) -> &F {
        &self.file
    }
}

#[derive(Debug)]
pub struct ConcatenatedFile<F> {
    segments: SmallVec<[Segment<F>; 4]>,
    size: usize,
    writable: bool,
}

/// Streamed-backend concatenation: per-segment seek/read/write routing.
pub type ConcatenatedStreamedFile = ConcatenatedFile<StreamedFile>;

/// Mapped-backend concatenation: each segment owns a shared mapping of its
/// file; the virtual range is an arena of per-segment mappings indexed by
/// binary search.
pub type ConcatenatedMappedFile = ConcatenatedFile<MappedFile>;

impl ConcatenatedFile<StreamedFile> {
    /// Opens each path in order as a `StreamedFile` segment.
    pub fn open<P: AsRef<Path>>(paths: &[P], writable: bool) -> Result<Self> {
        Self::open_with(paths, writable, |p: &Path, w| StreamedFile::open(p, w))
    }
}

impl ConcatenatedFile<MappedFile> {
    /// Opens each path in order as a `MappedFile` segment.
    pub fn open<P: AsRef<Path>>(paths: &[P], writable: bool) -> Result<Self> {
        Self::open_with(paths, writable, |p: &Path, w| MappedFile::open(p, w))
    }

    /// Forwards a page-cache hint to every segment intersecting the range.
    pub fn prefetch(&self, offset: usize, length: usize) {
        let end = offset.saturating_add(length).min(self.size);
        for segment in &self.segments {
            let seg_end = segment.logical_offset + segment.size;
            if segment.logical_offset >= end || seg_end <= offset {
                continue;
            }
            let local_start = offset.max(segment.logical_offset) - segment.logical_offset;
            let local_end = end.min(seg_end) - segment.logical_offset;
            segment.file.prefetch(local_start, local_end - local_start);
        }
    }
}

impl<F: Readable> ConcatenatedFile<F> {
    fn open_with<P: AsRef<Path>>(
        paths: &[P],
        writable: bool,
        open_one: impl Fn(&Path, bool) -> Result<F>,
    ) -> Result<Self> {
        let mut segments = SmallVec::new();
        let mut logical_offset = 0;

        // An error here drops the partially built list; each handle owns
        // its descriptor and mapping, so nothing acquired so far leaks.
        for path in paths {
            let file = open_one(path.as_ref(), writable)?;
            let size = file.size();
            segments.push(Segment {
                logical_offset,
                size,
                file,
            });
            logical_offset += size;
        }

        Ok(Self {
            segments,
            size: logical_offset,
            writable,
        })
    }

    /// Total virtual size: the sum of all segment sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment<F>> {
        self.segments.iter()
    }

    /// Finds the index of the segment containing the byte at `offset`.
    pub fn locate_segment(&self, offset: usize) -> Result<usize, AccessError> {
        // Requiring the single byte at `offset` to be in bounds rejects
        // offset == size, which no segment contains.
        check_range(offset, 1, self.size)?;

        let idx = self
            .segments
            .partition_point(|segment| segment.logical_offset <= offset)
            - 1;
        Ok(idx)
    }

    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size)?;

        if buf.is_empty() {
            return Ok(());
        }

        let mut idx = self.locate_segment(offset)?;
        let mut pos = offset;
        let mut filled = 0;

        while filled < buf.len() {
            let segment = &self.segments[idx];
            let local = pos - segment.logical_offset;
            if local >= segment.size {
                // Zero-sized segments occupy no virtual range; skip them.
                idx += 1;
                continue;
            }
            let step = (segment.size - local).min(buf.len() - filled);
            segment.file.read_into(local, &mut buf[filled..filled + step])?;
            filled += step;
            pos += step;
            idx += 1;
        }

        Ok(())
    }
}

impl<F: Writable> ConcatenatedFile<F> {
    pub fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, bytes.len(), self.size)?;

        if bytes.is_empty() {
            return Ok(());
        }

        let mut idx = self.locate_segment(offset)?;
        let mut pos = offset;
        let mut written = 0;

        while written < bytes.len() {
            let segment = &mut self.segments[idx];
            let local = pos - segment.logical_offset;
            if local >= segment.size {
                idx += 1;
                continue;
            }
            let step = (segment.size - local).min(bytes.len() - written);
            segment
                .file
                .write_data(&bytes[written..written + step], local)?;
            written += step;
            pos += step;
            idx += 1;
        }

        Ok(())
    }
}

impl<F: Syncable> ConcatenatedFile<F> {
    /// Best-effort flush, forwarded to every segment.
    pub fn sync(&self) {
        for segment in &self.segments {
            segment.file.sync();
        }
    }
}

impl<F: Readable> Readable for ConcatenatedFile<F> {
    fn size(&self) -> usize {
        self.size
    }

    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        ConcatenatedFile::read_into(self, offset, buf)
    }
}

impl<F: Writable> Writable for ConcatenatedFile<F> {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        ConcatenatedFile::write_data(self, bytes, offset)
    }
}

impl<F: Syncable> Syncable for ConcatenatedFile<F> {
    fn sync(&self) {
        ConcatenatedFile::sync(self)
    }
}
