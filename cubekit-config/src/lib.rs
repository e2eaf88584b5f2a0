//! Configuration management for the WiFi display appliance.
//!
//! Settings split across two homes. Plaintext, human-editable fields
//! (display wiring, rotation, NTP server) live in a JSON document on
//! the flash filesystem. Secrets (WiFi credentials, the web API token)
//! live in the device-bound secure store from [`cubekit-nvs`] and never
//! persist in plaintext after the one-time migration that
//! [`ConfigManager::load`] performs on legacy documents.
//!
//! ```
//! use cubekit_config::{ConfigManager, MemoryConfigFs, DEFAULT_CONFIG_PATH};
//! use cubekit_nvs::{DeviceIdentity, MemoryRegion, SecureStore};
//!
//! let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 123);
//! let store = SecureStore::new(MemoryRegion::default(), &identity, "public-salt");
//! let fs = MemoryConfigFs::new().with_file(DEFAULT_CONFIG_PATH, r#"{"lcd_rotation":2}"#);
//!
//! let mut config = ConfigManager::new(fs, store, DEFAULT_CONFIG_PATH);
//! config.load()?;
//! assert_eq!(config.display().rotation, 2);
//! # Ok::<(), cubekit_config::ConfigError>(())
//! ```
//!
//! [`cubekit-nvs`]: cubekit_nvs

// Docs use device-speak (WiFi, NTP).
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod fs;
pub mod manager;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use fs::{ConfigFs, DirConfigFs, MemoryConfigFs};
pub use manager::{ConfigManager, DEFAULT_CONFIG_PATH};
pub use settings::{DisplaySettings, DEFAULT_NTP_SERVER};
