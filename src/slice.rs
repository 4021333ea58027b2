//! # Slice Views
//!
//! `FileSlice` is a bounded window `[base_offset, base_offset + size)` into
//! a parent backend, with two consistency policies:
//!
//! - [`SliceMode::Direct`]: every operation translates the slice-local
//!   offset and forwards to the parent. Always consistent with the parent,
//!   one parent I/O per operation.
//! - [`SliceMode::Buffered`]: the window is snapshotted into a private
//!   buffer at creation; reads and writes touch only the buffer until
//!   [`FileSlice::sync`] writes it back or [`FileSlice::refresh`] re-reads
//!   it. Fast, but divergence from the parent is the caller's to reconcile.
//!
//! The slice borrows its parent mutably for its whole lifetime. That borrow
//! is the concurrency story: the parent cannot be read, written, resized,
//! or sliced again while this slice is live, so the classic hazard of a
//! structural parent edit invalidating an outstanding window is a compile
//! error instead of undefined behavior.
//!
//! Slices implement the capability traits themselves, so a slice composes
//! over any backend, a concatenation, or another slice.

use eyre::Result;

use crate::bounds::{check_range, check_writable};
use crate::traits::{Readable, Resizable, Writable};

/// Consistency policy of a [`FileSlice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceMode {
    /// Forward every operation to the parent at a translated offset.
    Direct,
    /// Operate on a private snapshot, reconciled on `sync`/`refresh`.
    Buffered,
}

#[derive(Debug)]
pub struct FileSlice<'a, F> {
    parent: &'a mut F,
    base_offset: usize,
    size: usize,
    writable: bool,
    /// `Some` iff the slice is buffered; always exactly `size` bytes.
    buffer: Option<Vec<u8>>,
}

impl<'a, F: Writable> FileSlice<'a, F> {
    /// Creates a window over `parent[base_offset .. base_offset + size)`.
    ///
    /// Fails `OutOfBounds` if the window exceeds the parent's current size.
    /// Writability is inherited from the parent.
    pub fn new(parent: &'a mut F, base_offset: usize, size: usize, mode: SliceMode) -> Result<Self> {
        check_range(base_offset, size, parent.size())?;

        let writable = parent.is_writable();
        let buffer = match mode {
            SliceMode::Direct => None,
            SliceMode::Buffered => Some(parent.read_data(base_offset, size)?),
        };

        Ok(Self {
            parent,
            base_offset,
            size,
            writable,
            buffer,
        })
    }

    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn mode(&self) -> SliceMode {
        if self.buffer.is_some() {
            SliceMode::Buffered
        } else {
            SliceMode::Direct
        }
    }

    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size)?;

        match &self.buffer {
            Some(buffer) => {
                buf.copy_from_slice(&buffer[offset..offset + buf.len()]);
                Ok(())
            }
            None => self.parent.read_into(self.base_offset + offset, buf),
        }
    }

    pub fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, bytes.len(), self.size)?;

        match &mut self.buffer {
            Some(buffer) => {
                buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            None => self.parent.write_data(bytes, self.base_offset + offset),
        }
    }

    /// Writes the private buffer back to the parent at `base_offset`.
    ///
    /// A no-op for direct slices, which never diverge. Can fail if the
    /// parent shrank beneath the window after this slice was created.
    pub fn sync(&mut self) -> Result<()> {
        if let Some(buffer) = &self.buffer {
            self.parent.write_data(buffer, self.base_offset)?;
        }
        Ok(())
    }

    /// Discards the private buffer and re-reads the window from the parent.
    ///
    /// A no-op for direct slices. Local unsynced writes are lost.
    pub fn refresh(&mut self) -> Result<()> {
        if let Some(buffer) = &mut self.buffer {
            self.parent.read_into(self.base_offset, buffer)?;
        }
        Ok(())
    }
}

impl<'a, F: Resizable> FileSlice<'a, F> {
    /// Inserts into the parent at the translated offset and widens the
    /// window by `bytes.len()`. In buffered mode the same insert is applied
    /// to the private buffer so it stays representative of the new window.
    pub fn insert_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, 0, self.size)?;

        self.parent.insert_data(bytes, self.base_offset + offset)?;
        self.size += bytes.len();

        if let Some(buffer) = &mut self.buffer {
            buffer.splice(offset..offset, bytes.iter().copied());
        }
        Ok(())
    }

    /// Deletes from the parent at the translated offset and narrows the
    /// window by `length`, mirroring the edit in the private buffer.
    pub fn delete_range(&mut self, offset: usize, length: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, length, self.size)?;

        self.parent.delete_range(self.base_offset + offset, length)?;
        self.size -= length;

        if let Some(buffer) = &mut self.buffer {
            buffer.drain(offset..offset + length);
        }
        Ok(())
    }
}

impl<'a, F: Writable> Readable for FileSlice<'a, F> {
    fn size(&self) -> usize {
        self.size
    }

    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        FileSlice::read_into(self, offset, buf)
    }
}

impl<'a, F: Writable> Writable for FileSlice<'a, F> {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        FileSlice::write_data(self, bytes, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::mapped::MappedFile;
    use crate::streamed::StreamedFile;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn fixture(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn window_creation_is_bounds_checked() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"0123456789");

        let mut file = StreamedFile::open(&path, false).unwrap();

        assert!(FileSlice::new(&mut file, 4, 7, SliceMode::Direct).is_err());
        assert!(FileSlice::new(&mut file, 4, 6, SliceMode::Direct).is_ok());
    }

    #[test]
    fn reads_translate_by_base_offset() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"0123456789");

        let mut file = MappedFile::open(&path, false).unwrap();
        let slice = FileSlice::new(&mut file, 3, 4, SliceMode::Direct).unwrap();

        let mut buf = [0u8; 2];
        slice.read_into(1, &mut buf).unwrap();
        assert_eq!(&buf, b"45");
    }

    #[test]
    fn direct_writes_are_immediately_visible_to_the_parent() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"0123456789");

        let mut file = MappedFile::open(&path, true).unwrap();
        {
            let mut slice = FileSlice::new(&mut file, 2, 4, SliceMode::Direct).unwrap();
            slice.write_data(b"XY", 1).unwrap();
        }

        let mut buf = [0u8; 10];
        file.read_into(0, &mut buf).unwrap();
        assert_eq!(&buf, b"012XY56789");
    }

    #[test]
    fn buffered_writes_are_invisible_until_sync() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"0123456789");

        let mut file = MappedFile::open(&path, true).unwrap();
        {
            let mut slice = FileSlice::new(&mut file, 2, 4, SliceMode::Buffered).unwrap();
            slice.write_data(b"XY", 1).unwrap();

            let mut local = [0u8; 2];
            slice.read_into(1, &mut local).unwrap();
            assert_eq!(&local, b"XY", "the slice SHOULD see its own write");
        }

        let mut buf = [0u8; 10];
        file.read_into(0, &mut buf).unwrap();
        assert_eq!(&buf, b"0123456789", "the parent SHOULD NOT see unsynced writes");

        {
            let mut slice = FileSlice::new(&mut file, 2, 4, SliceMode::Buffered).unwrap();
            slice.write_data(b"XY", 1).unwrap();
            slice.sync().unwrap();
        }

        file.read_into(0, &mut buf).unwrap();
        assert_eq!(&buf, b"012XY56789");
    }

    #[test]
    fn refresh_discards_local_writes() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abcdef");

        let mut file = StreamedFile::open(&path, true).unwrap();
        let mut slice = FileSlice::new(&mut file, 0, 6, SliceMode::Buffered).unwrap();

        slice.write_data(b"ZZ", 0).unwrap();
        slice.refresh().unwrap();

        let mut buf = [0u8; 6];
        slice.read_into(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn slice_over_read_only_parent_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abcdef");

        let mut file = StreamedFile::open(&path, false).unwrap();
        let mut slice = FileSlice::new(&mut file, 0, 6, SliceMode::Buffered).unwrap();

        assert!(!slice.is_writable());
        let err = slice.write_data(b"x", 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AccessError>(),
            Some(AccessError::NotWritable)
        ));
    }

    #[test]
    fn slice_local_out_of_bounds_is_rejected() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"0123456789");

        let mut file = StreamedFile::open(&path, true).unwrap();
        let mut slice = FileSlice::new(&mut file, 2, 4, SliceMode::Direct).unwrap();

        // In bounds for the parent, out of bounds for the window.
        let err = slice.write_data(b"xx", 3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AccessError>(),
            Some(AccessError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn insert_through_direct_slice_widens_the_window() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abcdef");

        let mut file = MappedFile::open(&path, true).unwrap();
        {
            let mut slice = FileSlice::new(&mut file, 2, 2, SliceMode::Direct).unwrap();
            slice.insert_data(b"XY", 1).unwrap();
            assert_eq!(slice.size(), 4);

            let mut buf = [0u8; 4];
            slice.read_into(0, &mut buf).unwrap();
            assert_eq!(&buf, b"cXYd");
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"abcXYdef");
    }

    #[test]
    fn delete_through_buffered_slice_narrows_window_and_buffer() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abXYcd");

        let mut file = MappedFile::open(&path, true).unwrap();
        {
            let mut slice = FileSlice::new(&mut file, 0, 6, SliceMode::Buffered).unwrap();
            slice.delete_range(2, 2).unwrap();
            assert_eq!(slice.size(), 4);

            let mut buf = [0u8; 4];
            slice.read_into(0, &mut buf).unwrap();
            assert_eq!(&buf, b"abcd");
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
    }

    #[test]
    fn slices_compose_over_slices() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"0123456789");

        let mut file = StreamedFile::open(&path, true).unwrap();
        let mut outer = FileSlice::new(&mut file, 2, 6, SliceMode::Direct).unwrap();
        let inner = FileSlice::new(&mut outer, 1, 3, SliceMode::Direct).unwrap();

        let mut buf = [0u8; 3];
        inner.read_into(0, &mut buf).unwrap();
        assert_eq!(&buf, b"345");
    }

    #[test]
    fn zero_length_slice_is_valid() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abc");

        let mut file = StreamedFile::open(&path, true).unwrap();
        let slice = FileSlice::new(&mut file, 3, 0, SliceMode::Buffered).unwrap();

        assert_eq!(slice.size(), 0);
        assert!(slice.read_into(0, &mut [0u8; 1]).is_err());
    }
}
