//! Record format constants and the on-region header codec.
//!
//! The persistent record occupies the front of a fixed-capacity
//! non-volatile region:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     magic ("NVS1"; the trailing digit is the layout version)
//! 4       2     payload length (u16 BE)
//! 6       ...   payload (cyclic-XOR obfuscated JSON document)
//! ```
//!
//! The layout is fixed by records already written in the field; changing
//! it requires bumping the version digit inside the magic.

use crate::error::NvsError;

/// Magic bytes at the start of every record.
///
/// The final byte doubles as the layout version digit.
pub const RECORD_MAGIC: &[u8; 4] = b"NVS1";

/// Size of the record header in bytes.
/// Layout: magic(4) + payload_len(2) = 6
pub const HEADER_SIZE: usize = 6;

/// Default region capacity in bytes, matching the segment the appliance
/// reserves for the store.
pub const DEFAULT_REGION_CAPACITY: usize = 2048;

/// Size of the derived obfuscation key in bytes (SHA-256 output).
pub const KEY_SIZE: usize = 32;

/// Upper bound imposed by the header's 16-bit length field.
const LEN_FIELD_LIMIT: usize = 0xFFFF;

/// Largest payload a region of `capacity` bytes can hold.
///
/// Bounded by the space left after the header and by the header's
/// 16-bit length field.
#[must_use]
pub const fn max_payload(capacity: usize) -> usize {
    let available = capacity.saturating_sub(HEADER_SIZE);
    if available > LEN_FIELD_LIMIT {
        LEN_FIELD_LIMIT
    } else {
        available
    }
}

// =============================================================================
// RecordHeader
// =============================================================================

/// Record header at the start of the region.
///
/// # Binary Layout (6 bytes)
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("NVS1")
/// 4       2     payload_len (u16 BE)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Payload length in bytes.
    pub payload_len: u16,
}

impl RecordHeader {
    /// Creates a header for a payload of the given length.
    #[must_use]
    pub const fn new(payload_len: u16) -> Self {
        Self { payload_len }
    }

    /// Encodes the header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(RECORD_MAGIC);
        buf[4..6].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    /// Decodes a header and validates it against a region capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer is shorter than a full header
    /// - Magic bytes don't match
    /// - The declared length is zero or exceeds what the region can hold
    pub fn decode(bytes: &[u8], capacity: usize) -> Result<Self, NvsError> {
        if bytes.len() < HEADER_SIZE {
            return Err(NvsError::Truncated {
                context: "record header".to_string(),
            });
        }

        if &bytes[0..4] != RECORD_MAGIC {
            return Err(NvsError::InvalidMagic {
                expected: RECORD_MAGIC,
                found: bytes[0..4].to_vec(),
            });
        }

        let payload_len = u16::from_be_bytes([bytes[4], bytes[5]]);
        let max = max_payload(capacity);
        if payload_len == 0 || usize::from(payload_len) > max {
            return Err(NvsError::InvalidLength {
                len: payload_len,
                max,
            });
        }

        Ok(Self { payload_len })
    }
}
