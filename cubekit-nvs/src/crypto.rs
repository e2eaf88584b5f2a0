//! Key derivation and payload obfuscation.
//!
//! The 32-byte obfuscation key is SHA-256 over the device identity and a
//! public salt. The payload cipher is a cyclic XOR of that key.
//!
//! # Security
//!
//! This scheme deters casual inspection of a flash dump and nothing more:
//! anyone who knows the device identity and the salt can recompute the
//! key, and XOR offers no integrity. It is kept because the records
//! already written in the field use it; upgrading to real encryption
//! would need a new layout version.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::format::KEY_SIZE;
use crate::identity::DeviceIdentity;

/// Derived 32-byte obfuscation key.
///
/// Never persisted; recomputed from identity and salt on demand and
/// zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ObfuscationKey([u8; KEY_SIZE]);

impl ObfuscationKey {
    /// Derives the key for a device identity and public salt.
    ///
    /// The digest input is `hardware_address || chip_id || salt`. Two
    /// derivations on the same device with the same salt always agree;
    /// changing the salt orphans previously written records, which the
    /// load path then treats as absent data.
    #[must_use]
    pub fn derive(identity: &DeviceIdentity, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.key_material().as_bytes());
        hasher.update(salt.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// XORs `data` in place with the key, cycling it by byte index.
    ///
    /// The transform is its own inverse: applying it twice restores the
    /// original bytes.
    pub fn apply_keystream(&self, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= self.0[i % KEY_SIZE];
        }
    }
}

impl std::fmt::Debug for ObfuscationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 123)
    }

    /// Known key bytes, so keystream behavior is checked independently
    /// of the derivation function.
    fn fixed_key() -> ObfuscationKey {
        ObfuscationKey::from_bytes(*b"0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = ObfuscationKey::derive(&identity(), "s");
        let b = ObfuscationKey::derive(&identity(), "s");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn salt_changes_the_key() {
        let a = ObfuscationKey::derive(&identity(), "s");
        let b = ObfuscationKey::derive(&identity(), "t");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn identity_changes_the_key() {
        let other = DeviceIdentity::new("AA:BB:CC:DD:EE:00".to_string(), 123);
        let a = ObfuscationKey::derive(&identity(), "s");
        let b = ObfuscationKey::derive(&other, "s");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn derivation_matches_plain_digest_of_concatenation() {
        let key = ObfuscationKey::derive(&identity(), "salt");
        let expected = Sha256::digest(b"AA:BB:CC:DD:EE:FF123salt");
        assert_eq!(key.as_bytes()[..], expected[..]);
    }

    #[test]
    fn keystream_is_self_inverse() {
        let key = fixed_key();
        let original = b"a value longer than the 32-byte key to cover wraparound".to_vec();
        let mut data = original.clone();

        key.apply_keystream(&mut data);
        assert_ne!(data, original);

        key.apply_keystream(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn keystream_cycles_key_by_index() {
        let key = fixed_key();
        let mut data = vec![0u8; KEY_SIZE + 3];

        key.apply_keystream(&mut data);

        assert_eq!(data[..KEY_SIZE], key.as_bytes()[..]);
        assert_eq!(data[KEY_SIZE..], key.as_bytes()[..3]);
    }

    #[test]
    fn debug_redacts_key_material() {
        let key = ObfuscationKey::derive(&identity(), "s");
        assert!(!format!("{key:?}").contains(&hex::encode(key.as_bytes())));
    }
}
