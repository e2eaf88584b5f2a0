//! File-backed region images for host-side tooling.
//!
//! A region image is a plain file whose length *is* the region capacity,
//! byte-for-byte identical to what the appliance keeps in its reserved
//! non-volatile segment. Bench tools read images pulled off a device and
//! write images to be flashed back.
//!
//! # Durability
//!
//! `commit` calls `fsync` so a flushed record survives host crashes the
//! same way a completed device write survives power loss.

// Region images are tiny; file lengths fit comfortably in usize.
#![allow(clippy::cast_possible_truncation)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{NvsError, NvsResult};
use crate::region::NvsRegion;

/// File-backed implementation of [`NvsRegion`].
#[derive(Debug)]
pub struct FileRegion {
    path: PathBuf,
    file: File,
    capacity: usize,
}

impl FileRegion {
    /// Opens an existing region image; its file length becomes the
    /// region capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata
    /// cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> NvsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| NvsError::io(format!("opening region image '{}'", path.display()), e))?;
        let capacity = file
            .metadata()
            .map_err(|e| NvsError::io(format!("reading metadata of '{}'", path.display()), e))?
            .len() as usize;

        Ok(Self {
            path,
            file,
            capacity,
        })
    }

    /// Creates a zero-filled region image of the given capacity,
    /// truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or sized.
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> NvsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| NvsError::io(format!("creating region image '{}'", path.display()), e))?;
        file.set_len(capacity as u64)
            .map_err(|e| NvsError::io(format!("sizing region image '{}'", path.display()), e))?;

        Ok(Self {
            path,
            file,
            capacity,
        })
    }

    /// Opens an image if it exists, otherwise creates one of the given
    /// capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open_or_create<P: AsRef<Path>>(path: P, capacity: usize) -> NvsResult<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path, capacity)
        }
    }

    /// Returns the image path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to(&mut self, offset: usize) -> NvsResult<()> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| NvsError::io(format!("seeking to offset {offset}"), e))?;
        Ok(())
    }

    fn check_bounds(&self, offset: usize, len: usize) -> NvsResult<()> {
        if offset.checked_add(len).is_some_and(|end| end <= self.capacity) {
            Ok(())
        } else {
            Err(NvsError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            })
        }
    }
}

impl NvsRegion for FileRegion {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> NvsResult<()> {
        self.check_bounds(offset, buf.len())?;
        self.seek_to(offset)?;
        self.file
            .read_exact(buf)
            .map_err(|e| NvsError::io(format!("reading {} bytes at offset {offset}", buf.len()), e))
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> NvsResult<()> {
        self.check_bounds(offset, data.len())?;
        self.seek_to(offset)?;
        self.file
            .write_all(data)
            .map_err(|e| NvsError::io(format!("writing {} bytes at offset {offset}", data.len()), e))
    }

    fn commit(&mut self) -> NvsResult<()> {
        self.file
            .sync_all()
            .map_err(|e| NvsError::io(format!("syncing region image '{}'", self.path.display()), e))
    }
}
