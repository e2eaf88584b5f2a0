//! Secure key-value store over a fixed-capacity region.
//!
//! The store keeps a JSON object of string keys and string values in
//! memory, mirrored by an obfuscated record at the front of the region:
//!
//! ```text
//! [ 6-byte header | cyclic-XOR obfuscated JSON document | unused ... ]
//! ```
//!
//! Every mutation rewrites the whole record. There is no journal and no
//! rollback: when a flush fails the in-memory document is ahead of the
//! region until the next successful flush or a restart.
//!
//! Initialization is lazy. The first accessor runs the load-or-create
//! sequence, and a record that fails any validation step is treated as
//! absent data, not as an error: the store resets to an empty document
//! and persists it so the header becomes valid again. Power loss in the
//! middle of a flush is recovered the same way on the next boot.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::crypto::ObfuscationKey;
use crate::error::{NvsError, NvsResult};
use crate::format::{max_payload, RecordHeader, HEADER_SIZE};
use crate::identity::DeviceIdentity;
use crate::region::NvsRegion;

/// Initialization state of the store.
///
/// `begin` is the only transition into `Ready`, and `Initializing`
/// guards the transition against re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreState {
    /// No initialization attempt has succeeded yet.
    Uninitialized,
    /// An initialization attempt is in flight.
    Initializing,
    /// The region holds a valid record mirrored by the in-memory document.
    Ready,
}

// =============================================================================
// SecureStore
// =============================================================================

/// Secure key-value store bound to a device identity.
///
/// Generic over the backing [`NvsRegion`] so firmware, host tooling, and
/// tests share the exact same record logic.
///
/// # Example
///
/// ```
/// use cubekit_nvs::{DeviceIdentity, MemoryRegion, SecureStore};
///
/// let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 123);
/// let mut store = SecureStore::new(MemoryRegion::new(256), &identity, "public-salt");
///
/// store.put("wifi_ssid", "hearth")?;
/// assert_eq!(store.get("wifi_ssid").as_deref(), Some("hearth"));
/// # Ok::<(), cubekit_nvs::NvsError>(())
/// ```
pub struct SecureStore<R: NvsRegion> {
    region: R,
    key: ObfuscationKey,
    doc: Map<String, Value>,
    state: StoreState,
}

impl<R: NvsRegion> SecureStore<R> {
    /// Creates a store over `region`, deriving the obfuscation key from
    /// `identity` and `salt`.
    ///
    /// No region access happens here; the first operation (or an
    /// explicit [`begin`](Self::begin)) loads or initializes the record.
    #[must_use]
    pub fn new(region: R, identity: &DeviceIdentity, salt: &str) -> Self {
        Self {
            key: ObfuscationKey::derive(identity, salt),
            region,
            doc: Map::new(),
            state: StoreState::Uninitialized,
        }
    }

    /// Returns whether a load-or-create sequence has completed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, StoreState::Ready)
    }

    /// Returns the backing region's capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Consumes the store and returns the backing region.
    ///
    /// Restart simulations hand the same region to a fresh store to
    /// exercise the reload path.
    #[must_use]
    pub fn into_region(self) -> R {
        self.region
    }

    /// Loads the existing record, or initializes the region with an
    /// empty document when no readable record exists.
    ///
    /// Idempotent once ready. A corrupt or missing record is not an
    /// error: the store resets to an empty document and persists it so
    /// the header becomes valid.
    ///
    /// # Errors
    ///
    /// Fails only when the freshly-initialized empty document cannot be
    /// flushed; the store is then left not ready and the next accessor
    /// retries.
    pub fn begin(&mut self) -> NvsResult<()> {
        match self.state {
            StoreState::Ready => return Ok(()),
            StoreState::Initializing => return Err(NvsError::InitInProgress),
            StoreState::Uninitialized => {}
        }
        self.state = StoreState::Initializing;

        match self.load_document() {
            Some(doc) => {
                debug!("loaded existing record with {} entries", doc.len());
                self.doc = doc;
            }
            None => {
                self.doc = Map::new();
                if let Err(err) = self.flush() {
                    self.state = StoreState::Uninitialized;
                    return Err(err);
                }
                debug!("initialized empty record");
            }
        }

        self.state = StoreState::Ready;
        Ok(())
    }

    /// Returns the value for `key`.
    ///
    /// Lazily initializes the store; returns `None` when initialization
    /// fails, the key is absent, or the stored value is not a string
    /// (including null).
    pub fn get(&mut self, key: &str) -> Option<String> {
        if self.begin().is_err() {
            return None;
        }
        match self.doc.get(key) {
            Some(Value::String(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the value for `key`, or `default` when unavailable.
    pub fn get_or(&mut self, key: &str, default: &str) -> String {
        self.get(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Inserts or overwrites `key → value` and flushes the whole
    /// document.
    ///
    /// On a flush failure the in-memory insert is kept, not rolled back:
    /// the value is set in memory but not durable, and the next
    /// successful flush or a restart reconverges the two.
    ///
    /// # Errors
    ///
    /// Fails when lazy initialization fails, the document would exceed
    /// the region's payload capacity, or the region write fails.
    pub fn put(&mut self, key: &str, value: &str) -> NvsResult<()> {
        self.begin()?;
        self.doc
            .insert(key.to_string(), Value::String(value.to_string()));
        self.flush()
    }

    /// Applies a batch of upserts with a single whole-document flush.
    ///
    /// Failure semantics match [`put`](Self::put): applied entries stay
    /// in memory even when the one flush fails.
    ///
    /// # Errors
    ///
    /// Same conditions as [`put`](Self::put).
    pub fn put_many<'a, I>(&mut self, entries: I) -> NvsResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.begin()?;
        for (key, value) in entries {
            self.doc
                .insert(key.to_string(), Value::String(value.to_string()));
        }
        self.flush()
    }

    /// Deletes `key` and flushes the whole document.
    ///
    /// Removing an absent key is a no-op that still re-flushes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`put`](Self::put).
    pub fn remove(&mut self, key: &str) -> NvsResult<()> {
        self.begin()?;
        self.doc.remove(key);
        self.flush()
    }

    /// Returns all string entries as key/value pairs.
    ///
    /// Lazily initializes the store; returns an empty list when
    /// initialization fails.
    pub fn entries(&mut self) -> Vec<(String, String)> {
        if self.begin().is_err() {
            return Vec::new();
        }
        self.doc
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key.clone(), s.clone())),
                _ => None,
            })
            .collect()
    }

    /// Attempts to read and decode an existing record.
    ///
    /// Any failure is "no existing data": the caller reinitializes
    /// rather than erroring, per the recovery rules.
    fn load_document(&mut self) -> Option<Map<String, Value>> {
        let capacity = self.region.capacity();
        if capacity <= HEADER_SIZE {
            warn!("region capacity {capacity} cannot hold a record");
            return None;
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        if let Err(err) = self.region.read_at(0, &mut header_bytes) {
            warn!("record header unreadable: {err}");
            return None;
        }
        let header = match RecordHeader::decode(&header_bytes, capacity) {
            Ok(header) => header,
            Err(err) => {
                warn!("record header invalid: {err}");
                return None;
            }
        };

        let mut payload = vec![0u8; usize::from(header.payload_len)];
        if let Err(err) = self.region.read_at(HEADER_SIZE, &mut payload) {
            warn!("record payload unreadable: {err}");
            return None;
        }
        self.key.apply_keystream(&mut payload);

        match serde_json::from_slice(&payload) {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!("record payload does not decode: {err}");
                None
            }
        }
    }

    /// Serializes and writes the whole document: header first, then the
    /// obfuscated payload, then a single commit.
    ///
    /// The capacity check happens before any byte is written, so a
    /// rejected flush leaves the previous record intact.
    fn flush(&mut self) -> NvsResult<()> {
        let mut payload = serde_json::to_vec(&self.doc)?;
        let max = max_payload(self.region.capacity());
        let payload_len = match u16::try_from(payload.len()) {
            Ok(len) if usize::from(len) <= max => len,
            _ => {
                return Err(NvsError::DocumentTooLarge {
                    len: payload.len(),
                    max,
                })
            }
        };

        let header = RecordHeader::new(payload_len);
        self.key.apply_keystream(&mut payload);
        self.region.write_at(0, &header.encode())?;
        self.region.write_at(HEADER_SIZE, &payload)?;
        self.region.commit()
    }
}
