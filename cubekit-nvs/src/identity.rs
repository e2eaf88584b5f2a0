//! Device identity inputs for key derivation.

use std::fmt;

/// Hardware identity of the device hosting the store.
///
/// The obfuscation key is bound to these values, so a record copied to
/// different hardware decodes to garbage. Firmware fills this from the
/// network interface and the vendor chip register; host tooling passes
/// the same strings the device would report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Network hardware address, canonically colon-separated uppercase
    /// hex (`"AA:BB:CC:DD:EE:FF"`).
    hardware_address: String,
    /// Vendor chip identifier.
    chip_id: u32,
}

impl DeviceIdentity {
    /// Creates an identity from a hardware address and chip identifier.
    ///
    /// The address string participates in key derivation verbatim, so
    /// callers must pass it in the same casing and separator style the
    /// device reports.
    #[must_use]
    pub const fn new(hardware_address: String, chip_id: u32) -> Self {
        Self {
            hardware_address,
            chip_id,
        }
    }

    /// Returns the hardware address.
    #[must_use]
    pub fn hardware_address(&self) -> &str {
        &self.hardware_address
    }

    /// Returns the chip identifier.
    #[must_use]
    pub const fn chip_id(&self) -> u32 {
        self.chip_id
    }

    /// Renders the identity as key-derivation material: the hardware
    /// address immediately followed by the decimal chip identifier.
    #[must_use]
    pub fn key_material(&self) -> String {
        format!("{}{}", self.hardware_address, self.chip_id)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hardware_address, self.chip_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_material_concatenates_address_and_decimal_chip_id() {
        let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 123);
        assert_eq!(identity.key_material(), "AA:BB:CC:DD:EE:FF123");
    }

    #[test]
    fn display_separates_fields() {
        let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 42);
        assert_eq!(identity.to_string(), "AA:BB:CC:DD:EE:FF/42");
    }
}
