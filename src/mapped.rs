//! # Memory-Mapped File Backend
//!
//! `MappedFile` maps a file into the process address space over its full
//! current length and serves reads and writes as bounds-checked slice
//! copies. The mapping is shared (`MAP_SHARED` on unix), so writes are
//! visible to every other mapper of the same file; durability comes from an
//! explicit flush of exactly the written range after each write, or from
//! `sync()`.
//!
//! ## Remap Safety
//!
//! The mapping becomes invalid whenever the file is resized and remapped.
//! Instead of runtime guards (hazard pointers, epochs, reference counts),
//! this type leverages the borrow checker: reads borrow `&self`, and every
//! operation that can remap takes `&mut self`, so the compiler proves no
//! reference into the old mapping survives a resize. No access path caches
//! a pointer across a remap; every call re-borrows the current mapping.
//!
//! ## Resize Failure Policy
//!
//! `resize` flushes, drops the old mapping, truncates, then remaps. If the
//! truncate or remap step fails, the error is surfaced and the handle is
//! left empty (size 0, no mapping), never with a stale pointer/size pair.
//! The handle stays usable, but its previous contents are only reachable by
//! reopening the file.
//!
//! ## Empty Files
//!
//! Zero-length mappings are invalid at the OS level, so an empty file holds
//! no mapping object at all. The first growing `resize` (or `insert_data`)
//! creates the mapping.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{eyre, Result, WrapErr};
use memmap2::{Mmap, MmapMut};

use crate::bounds::{check_range, check_writable};
use crate::traits::{Readable, Resizable, Syncable, Writable};

/// The mapping state of a handle. Writable handles hold `ReadWrite` when
/// non-empty; read-only handles hold `ReadOnly`; size-0 handles hold
/// `Empty` regardless of the write flag.
#[derive(Debug)]
enum Mapping {
    Empty,
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::Empty => &[],
            Mapping::ReadOnly(map) => map,
            Mapping::ReadWrite(map) => map,
        }
    }
}

/// Projects the read-write mapping out of the state enum. Unreachable after
/// `check_writable` plus a non-empty bounds check: a writable handle with
/// non-zero size always holds `ReadWrite`.
fn rw_map<'a>(mapping: &'a mut Mapping, path: &Path) -> Result<&'a mut MmapMut> {
    match mapping {
        Mapping::ReadWrite(map) => Ok(map),
        _ => Err(eyre!(
            "no writable mapping present for '{}'",
            path.display()
        )),
    }
}

#[derive(Debug)]
pub struct MappedFile {
    file: File,
    path: PathBuf,
    mapping: Mapping,
    size: usize,
    writable: bool,
}

impl MappedFile {
    /// Opens an existing file and maps it over its full current length.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .wrap_err_with(|| format!("failed to open file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?;
        let size = metadata.len() as usize;

        let mapping = if size == 0 {
            Mapping::Empty
        } else if writable {
            // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files
            // can be modified externally. This is safe because:
            // 1. The handle assumes externally serialized, single-owner use
            //    of the file for its lifetime (crate contract)
            // 2. The mapping's lifetime is tied to MappedFile, preventing
            //    use-after-unmap
            // 3. All access goes through bounds-checked slice indexing
            let map = unsafe { MmapMut::map_mut(&file) }
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?;
            Mapping::ReadWrite(map)
        } else {
            // SAFETY: same justification as the writable arm; the mapping is
            // additionally never written through.
            let map = unsafe { Mmap::map(&file) }
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?;
            Mapping::ReadOnly(map)
        };

        Ok(Self {
            file,
            path: path.to_path_buf(),
            mapping,
            size,
            writable,
        })
    }

    /// Creates (or truncates) a file and opens it writable with size 0.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create file '{}'", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            mapping: Mapping::Empty,
            size: 0,
            writable: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size)?;

        buf.copy_from_slice(&self.mapping.as_slice()[offset..offset + buf.len()]);
        Ok(())
    }

    pub fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, bytes.len(), self.size)?;

        if bytes.is_empty() {
            return Ok(());
        }

        let MappedFile { mapping, path, .. } = self;
        let map = rw_map(mapping, path)?;
        map[offset..offset + bytes.len()].copy_from_slice(bytes);
        map.flush_range(offset, bytes.len())
            .wrap_err_with(|| format!("failed to flush written range of '{}'", path.display()))
    }

    /// Best-effort flush of the whole mapping to stable storage.
    pub fn sync(&self) {
        if let Mapping::ReadWrite(map) = &self.mapping {
            let _ = map.flush();
        }
    }

    /// Sets the absolute length to `new_size`, remapping at the new length.
    ///
    /// See the module docs for the failure policy: a failed truncate or
    /// remap leaves the handle empty rather than holding a stale mapping.
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        check_writable(self.writable)?;

        if new_size == self.size {
            return Ok(());
        }

        if let Mapping::ReadWrite(map) = &self.mapping {
            map.flush().wrap_err_with(|| {
                format!("failed to flush '{}' before resize", self.path.display())
            })?;
        }

        // Drop the old mapping before the file length changes; a shrink
        // under a live mapping would leave pages that fault on access.
        self.mapping = Mapping::Empty;
        self.size = 0;

        self.file.set_len(new_size as u64).wrap_err_with(|| {
            format!(
                "failed to resize '{}' to {} bytes",
                self.path.display(),
                new_size
            )
        })?;

        if new_size > 0 {
            // SAFETY: MmapMut::map_mut is unsafe because the mapping aliases
            // file contents that could change externally. This is safe because:
            // 1. resize takes &mut self, so the borrow checker proves no
            //    reference into the old mapping is live
            // 2. The old mapping was dropped above; this is a fresh map of
            //    the file at exactly its new length
            // 3. The handle owns the file for its lifetime (crate contract)
            let map = unsafe { MmapMut::map_mut(&self.file) }.wrap_err_with(|| {
                format!("failed to remap '{}' after resize", self.path.display())
            })?;
            self.mapping = Mapping::ReadWrite(map);
        }
        self.size = new_size;

        Ok(())
    }

    pub fn insert_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, 0, self.size)?;

        if bytes.is_empty() {
            return Ok(());
        }

        let old_size = self.size;
        self.resize(old_size + bytes.len())?;

        // The resize invalidated the previous mapping; re-borrow the fresh one.
        let MappedFile { mapping, path, .. } = self;
        let map = rw_map(mapping, path)?;
        map.copy_within(offset..old_size, offset + bytes.len());
        map[offset..offset + bytes.len()].copy_from_slice(bytes);

        let affected = old_size + bytes.len() - offset;
        map.flush_range(offset, affected)
            .wrap_err_with(|| format!("failed to flush inserted range of '{}'", path.display()))
    }

    pub fn delete_range(&mut self, offset: usize, length: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, length, self.size)?;

        if length == 0 {
            return Ok(());
        }

        let size = self.size;
        {
            let MappedFile { mapping, path, .. } = self;
            let map = rw_map(mapping, path)?;
            map.copy_within(offset + length..size, offset);
        }

        // resize flushes the shifted tail before remapping at the new length.
        self.resize(size - length)
    }

    /// Hints the OS to fault in `[offset, offset + length)` ahead of use.
    /// Clamped to the current size; a no-op outside unix.
    pub fn prefetch(&self, offset: usize, length: usize) {
        if offset >= self.size {
            return;
        }

        let end = offset.saturating_add(length).min(self.size);
        let len = end - offset;
        if len == 0 {
            return;
        }

        let slice = self.mapping.as_slice();

        #[cfg(unix)]
        // SAFETY: madvise with MADV_WILLNEED is a hint and cannot corrupt
        // memory. The range is valid because:
        // 1. offset < self.size was checked above
        // 2. end is clamped to self.size, so offset + len never exceeds the
        //    mapping length
        unsafe {
            libc::madvise(
                slice.as_ptr().add(offset) as *mut libc::c_void,
                len,
                libc::MADV_WILLNEED,
            );
        }

        #[cfg(not(unix))]
        let _ = slice;
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        // Mirror close-time durability of the streamed backend: best-effort.
        self.sync();
    }
}

impl Readable for MappedFile {
    fn size(&self) -> usize {
        self.size
    }

    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        MappedFile::read_into(self, offset, buf)
    }
}

impl Writable for MappedFile {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        MappedFile::write_data(self, bytes, offset)
    }
}

impl Syncable for MappedFile {
    fn sync(&self) {
        MappedFile::sync(self)
    }
}

impl Resizable for MappedFile {
    fn resize(&mut self, new_size: usize) -> Result<()> {
        MappedFile::resize(self, new_size)
    }

    fn insert_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        MappedFile::insert_data(self, bytes, offset)
    }

    fn delete_range(&mut self, offset: usize, length: usize) -> Result<()> {
        MappedFile::delete_range(self, offset, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use tempfile::tempdir;

    fn fixture(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn open_maps_full_length() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"hello world");

        let file = MappedFile::open(&path, false).unwrap();

        assert_eq!(file.size(), 11);
        let mut buf = [0u8; 5];
        file.read_into(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", &[0u8; 8]);

        let mut file = MappedFile::open(&path, true).unwrap();
        file.write_data(&[0xCA, 0xFE], 3).unwrap();

        let mut buf = [0u8; 2];
        file.read_into(3, &mut buf).unwrap();
        assert_eq!(buf, [0xCA, 0xFE]);
    }

    #[test]
    fn writes_reach_the_backing_file() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", &[0u8; 4]);

        {
            let mut file = MappedFile::open(&path, true).unwrap();
            file.write_data(b"data", 0).unwrap();
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn writes_are_visible_to_other_mappers_of_the_same_file() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", &[0u8; 4]);

        let reader = MappedFile::open(&path, false).unwrap();
        let mut writer = MappedFile::open(&path, true).unwrap();

        writer.write_data(&[7, 7, 7, 7], 0).unwrap();

        let mut buf = [0u8; 4];
        reader.read_into(0, &mut buf).unwrap();
        assert_eq!(buf, [7, 7, 7, 7], "shared mappings SHOULD alias the same pages");
    }

    #[test]
    fn read_only_handle_rejects_mutation() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abcd");

        let mut file = MappedFile::open(&path, false).unwrap();

        for err in [
            file.write_data(b"x", 0).unwrap_err(),
            file.resize(8).unwrap_err(),
            file.insert_data(b"x", 0).unwrap_err(),
            file.delete_range(0, 1).unwrap_err(),
        ] {
            assert!(matches!(
                err.downcast_ref::<AccessError>(),
                Some(AccessError::NotWritable)
            ));
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
    }

    #[test]
    fn out_of_bounds_access_leaves_file_unmodified() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abcd");

        let mut file = MappedFile::open(&path, true).unwrap();

        let err = file.write_data(b"xyz", 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AccessError>(),
            Some(AccessError::OutOfBounds { .. })
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
    }

    #[test]
    fn resize_preserves_existing_data() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abc");

        let mut file = MappedFile::open(&path, true).unwrap();

        file.resize(6).unwrap();
        assert_eq!(file.size(), 6);

        let mut buf = [0u8; 6];
        file.read_into(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abc\x00\x00\x00");

        file.resize(2).unwrap();
        assert_eq!(file.size(), 2);
        assert_eq!(std::fs::read(&path).unwrap(), b"ab");
    }

    #[test]
    fn resize_to_zero_and_back() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abc");

        let mut file = MappedFile::open(&path, true).unwrap();

        file.resize(0).unwrap();
        assert_eq!(file.size(), 0);
        assert!(file.read_into(0, &mut [0u8; 1]).is_err());

        file.resize(3).unwrap();
        file.write_data(b"xyz", 0).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"xyz");
    }

    #[test]
    fn insert_shifts_tail_with_overlap_safe_copy() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abcdef");

        let mut file = MappedFile::open(&path, true).unwrap();
        file.insert_data(b"XY", 2).unwrap();

        assert_eq!(file.size(), 8);
        assert_eq!(std::fs::read(&path).unwrap(), b"abXYcdef");
    }

    #[test]
    fn insert_into_empty_file_via_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.bin");

        let mut file = MappedFile::create(&path).unwrap();
        assert_eq!(file.size(), 0);

        file.insert_data(b"seed", 0).unwrap();

        assert_eq!(file.size(), 4);
        assert_eq!(std::fs::read(&path).unwrap(), b"seed");
    }

    #[test]
    fn delete_shifts_tail_back_and_shrinks() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", b"abXYcdef");

        let mut file = MappedFile::open(&path, true).unwrap();
        file.delete_range(2, 2).unwrap();

        assert_eq!(file.size(), 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    }

    #[test]
    fn insert_then_delete_restores_original_bytes() {
        let dir = tempdir().unwrap();
        let original = b"0123456789";

        for offset in 0..=original.len() {
            let path = fixture(&dir, &format!("f{}.bin", offset), original);
            let mut file = MappedFile::open(&path, true).unwrap();

            file.insert_data(b"INS", offset).unwrap();
            file.delete_range(offset, 3).unwrap();

            assert_eq!(file.size(), original.len());
            assert_eq!(std::fs::read(&path).unwrap(), original);
        }
    }

    #[test]
    fn empty_file_opens_with_size_zero() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "empty.bin", b"");

        let file = MappedFile::open(&path, false).unwrap();

        assert_eq!(file.size(), 0);
        assert!(file.read_into(0, &mut [0u8; 1]).is_err());
        assert!(file.read_into(0, &mut [0u8; 0]).is_ok());
    }

    #[test]
    fn prefetch_is_a_hint_and_tolerates_any_range() {
        let dir = tempdir().unwrap();
        let path = fixture(&dir, "f.bin", &[1u8; 64]);

        let file = MappedFile::open(&path, false).unwrap();

        file.prefetch(0, 64);
        file.prefetch(32, usize::MAX);
        file.prefetch(64, 1);
    }
}
