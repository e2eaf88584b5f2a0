//! Error types for the secure key-value store.

use thiserror::Error;

/// Result type for store operations.
pub type NvsResult<T> = Result<T, NvsError>;

/// Errors raised by the secure key-value store and its backing regions.
///
/// Corrupt records never surface here: the load path treats anything
/// unreadable as absence of data and reinitializes. These variants cover
/// the failures that remain observable per the recovery rules, plus the
/// diagnostics returned by [`RecordHeader::decode`](crate::format::RecordHeader::decode)
/// for tooling that wants to know *why* a record is unreadable.
#[derive(Debug, Error)]
pub enum NvsError {
    /// An I/O operation on the backing region failed.
    #[error("region i/o error while {context}: {source}")]
    Io {
        /// Context describing the operation.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A region access would extend past the end of the region.
    #[error("access of {len} bytes at offset {offset} exceeds region capacity {capacity}")]
    OutOfBounds {
        /// Byte offset of the access.
        offset: usize,
        /// Length of the access in bytes.
        len: usize,
        /// Region capacity in bytes.
        capacity: usize,
    },

    /// The record is shorter than a full header.
    #[error("record truncated while reading {context}")]
    Truncated {
        /// Context describing what was being read.
        context: String,
    },

    /// Invalid magic bytes at the start of the record.
    #[error("invalid record magic: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: &'static [u8],
        /// Actual bytes found.
        found: Vec<u8>,
    },

    /// The header's declared payload length is unusable.
    #[error("declared payload length {len} outside valid range 1..={max}")]
    InvalidLength {
        /// Declared payload length.
        len: u16,
        /// Largest payload the region can hold.
        max: usize,
    },

    /// The serialized document exceeds the region's payload capacity.
    #[error("document of {len} bytes exceeds payload capacity {max}")]
    DocumentTooLarge {
        /// Serialized document size in bytes.
        len: usize,
        /// Largest payload the region can hold.
        max: usize,
    },

    /// Document serialization failed.
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Initialization was re-entered while already in flight.
    #[error("initialization already in progress")]
    InitInProgress,
}

impl NvsError {
    /// Creates an I/O error with context.
    #[must_use]
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
