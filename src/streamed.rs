//! # Streamed File Backend
//!
//! `StreamedFile` is the syscall-based backend: every read and write is an
//! explicit seek plus an exact-length I/O call on the descriptor. It is the
//! structural twin of [`MappedFile`](crate::mapped::MappedFile), with the
//! same operation set and bounds policy, trading the mapped backend's
//! pointer-copy reads for portability and a constant memory footprint.
//!
//! ## Size Tracking
//!
//! The size is read from file metadata at open time and cached; every
//! mutation that changes the length updates the cache in the same call, so
//! no end-of-file seek is needed per operation.
//!
//! ## Structural Edits
//!
//! `insert_data` and `delete_range` shift the tail of the file through an
//! in-memory scratch buffer: both are O(size − offset) and need enough
//! memory to hold the shifted tail. They are not atomic; a crash mid-shift
//! leaves the file partially edited. Crash recovery is out of scope.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use crate::bounds::{check_range, check_writable};
use crate::traits::{Readable, Resizable, Syncable, Writable};

#[derive(Debug)]
pub struct StreamedFile {
    file: File,
    path: PathBuf,
    size: usize,
    writable: bool,
}

impl StreamedFile {
    /// Opens an existing file, readable or read/update.
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

        Ok(Self {
            file,
            path: path.to_path_buf(),
            size: metadata.len() as usize,
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

    fn seek_read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        (&self.file)
            .seek(SeekFrom::Start(offset as u64))
            .wrap_err_with(|| format!("failed to seek to {} in '{}'", offset, self.path.display()))?;
        (&self.file).read_exact(buf).wrap_err_with(|| {
            format!(
                "failed to read {} bytes at {} from '{}'",
                buf.len(),
                offset,
                self.path.display()
            )
        })
    }

    fn seek_write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        (&self.file)
            .seek(SeekFrom::Start(offset as u64))
            .wrap_err_with(|| format!("failed to seek to {} in '{}'", offset, self.path.display()))?;
        (&self.file).write_all(bytes).wrap_err_with(|| {
            format!(
                "failed to write {} bytes at {} to '{}'",
                bytes.len(),
                offset,
                self.path.display()
            )
        })
    }

    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size)?;

        if buf.is_empty() {
            return Ok(());
        }

        self.seek_read(offset, buf)
    }

    pub fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, bytes.len(), self.size)?;

        if bytes.is_empty() {
            return Ok(());
        }

        self.seek_write(offset, bytes)
    }

    /// Best-effort flush of descriptor buffers to stable storage.
    pub fn sync(&self) {
        let _ = self.file.sync_all();
    }

    /// Sets the absolute length to `new_size`, extending with zero bytes or
    /// truncating, including to 0.
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        check_writable(self.writable)?;

        if new_size == self.size {
            return Ok(());
        }

        self.file.set_len(new_size as u64).wrap_err_with(|| {
            format!(
                "failed to resize '{}' to {} bytes",
                self.path.display(),
                new_size
            )
        })?;
        self.size = new_size;

        Ok(())
    }

    pub fn insert_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, 0, self.size)?;

        if bytes.is_empty() {
            return Ok(());
        }

        let mut tail = vec![0u8; self.size - offset];
        self.read_into(offset, &mut tail)?;

        self.resize(self.size + bytes.len())?;

        self.write_data(&tail, offset + bytes.len())?;
        self.write_data(bytes, offset)
    }

    pub fn delete_range(&mut self, offset: usize, length: usize) -> Result<()> {
        check_writable(self.writable)?;
        check_range(offset, length, self.size)?;

        if length == 0 {
            return Ok(());
        }

        let mut tail = vec![0u8; self.size - offset - length];
        self.read_into(offset + length, &mut tail)?;

        self.write_data(&tail, offset)?;
        self.resize(self.size - length)
    }
}

impl Readable for StreamedFile {
    fn size(&self) -> usize {
        self.size
    }

    fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        StreamedFile::read_into(self, offset, buf)
    }
}

impl Writable for StreamedFile {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        StreamedFile::write_data(self, bytes, offset)
    }
}

impl Syncable for StreamedFile {
    fn sync(&self) {
        StreamedFile::sync(self)
    }
}

impl Resizable for StreamedFile {
    fn resize(&mut self, new_size: usize) -> Result<()> {
        StreamedFile::resize(self, new_size)
    }

    fn insert_data(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        StreamedFile::insert_data(self, bytes, offset)
    }

    fn delete_range(&mut self, offset: usize, length: usize) -> Result<()> {
        StreamedFile::delete_range(self, offset, length)
    }
}
