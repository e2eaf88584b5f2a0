//! Byte-addressable non-volatile region abstraction.
//!
//! [`NvsRegion`] is the seam between the store and the physical medium.
//! Firmware backs it with a memory-mapped flash segment, host tooling
//! with a file image, tests with [`MemoryRegion`]. Implementations expose
//! raw random-access bytes only; record framing and obfuscation live in
//! [`SecureStore`](crate::SecureStore).
//!
//! The store runs single-threaded on the device's control loop, so the
//! access methods take `&mut self` rather than hiding interior locking.

use crate::error::{NvsError, NvsResult};
use crate::format::DEFAULT_REGION_CAPACITY;

/// A fixed-capacity, byte-addressable non-volatile memory region.
pub trait NvsRegion {
    /// Total region capacity in bytes.
    fn capacity(&self) -> usize;

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the region or the
    /// underlying medium fails.
    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> NvsResult<()>;

    /// Writes `data` starting at `offset`.
    ///
    /// Writes may be buffered until [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the region or the
    /// underlying medium fails.
    fn write_at(&mut self, offset: usize, data: &[u8]) -> NvsResult<()>;

    /// Makes all previous writes durable.
    ///
    /// Called once per whole-record flush, after the header and payload
    /// writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium fails to persist.
    fn commit(&mut self) -> NvsResult<()>;
}

/// Validates that `offset..offset + len` lies inside `capacity`.
fn check_bounds(offset: usize, len: usize, capacity: usize) -> NvsResult<usize> {
    offset
        .checked_add(len)
        .filter(|end| *end <= capacity)
        .ok_or(NvsError::OutOfBounds {
            offset,
            len,
            capacity,
        })
}

// =============================================================================
// MemoryRegion
// =============================================================================

/// In-memory region used by tests and simulated devices.
///
/// Contents survive across store instances that share the same value, so
/// restart behavior can be exercised by moving the region from one store
/// into a fresh one. A commit counter supports flush-count assertions.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    bytes: Vec<u8>,
    commit_count: usize,
}

impl MemoryRegion {
    /// Creates a zero-filled region of the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            commit_count: 0,
        }
    }

    /// Creates a region from an existing byte image.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            commit_count: 0,
        }
    }

    /// Returns the raw region image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns how many commits have been performed.
    #[must_use]
    pub const fn commit_count(&self) -> usize {
        self.commit_count
    }
}

impl Default for MemoryRegion {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_CAPACITY)
    }
}

impl NvsRegion for MemoryRegion {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> NvsResult<()> {
        let end = check_bounds(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> NvsResult<()> {
        let end = check_bounds(offset, data.len(), self.bytes.len())?;
        self.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> NvsResult<()> {
        self.commit_count += 1;
        Ok(())
    }
}
