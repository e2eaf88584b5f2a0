//! Device-bound secure key-value store over a fixed-capacity
//! non-volatile memory region.
//!
//! The store holds a small document of string keys and string values and
//! persists it as a single validated record:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     magic ("NVS1")
//! 4       2     payload length (u16 BE)
//! 6       ...   payload, cyclic-XOR obfuscated with a 32-byte derived key
//! ```
//!
//! The obfuscation key is SHA-256 over the device's hardware address,
//! chip identifier, and a public salt, so records are bound to the
//! physical device that wrote them. The scheme deters casual flash
//! dumping only; see [`crypto`] for the threat model.
//!
//! [`SecureStore`] is generic over [`NvsRegion`], the seam to the
//! physical medium: firmware supplies a flash segment, host tooling a
//! [`FileRegion`] image, tests a [`MemoryRegion`].
//!
//! ```
//! use cubekit_nvs::{DeviceIdentity, MemoryRegion, SecureStore};
//!
//! let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 123);
//! let mut store = SecureStore::new(MemoryRegion::default(), &identity, "public-salt");
//!
//! store.put("api_token", "tok_1")?;
//! assert_eq!(store.get_or("api_token", ""), "tok_1");
//! # Ok::<(), cubekit_nvs::NvsError>(())
//! ```

pub mod crypto;
pub mod error;
pub mod file;
pub mod format;
pub mod identity;
pub mod region;
pub mod store;

pub use crypto::ObfuscationKey;
pub use error::{NvsError, NvsResult};
pub use file::FileRegion;
pub use identity::DeviceIdentity;
pub use region::{MemoryRegion, NvsRegion};
pub use store::SecureStore;
