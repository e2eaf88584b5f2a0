//! Configuration manager: plaintext document plus secret-field
//! migration.
//!
//! The manager owns two persistence surfaces. Non-secret settings live
//! in a JSON document on the flash filesystem, human-editable and
//! rewritten whole on save. Secrets (network credentials, the API
//! token) live in the device-bound secure store and are only mirrored
//! into memory.
//!
//! Devices provisioned by hand start with secrets inside the plaintext
//! document. The first successful load moves each such value into the
//! store and rewrites the document without it; from then on the store
//! is authoritative and the document never carries secrets again. The
//! migration is per field and idempotent, so interrupting it midway
//! loses nothing: whatever was not yet moved still sits in the
//! document for the next boot.

// Docs use device-speak (WiFi, NTP, field names).
#![allow(clippy::doc_markdown)]

use log::{error, info, warn};
use serde_json::{Map, Value};

use cubekit_nvs::{NvsRegion, SecureStore};

use crate::error::{ConfigError, ConfigResult};
use crate::fs::ConfigFs;
use crate::settings::{
    str_field, DisplaySettings, DEFAULT_NTP_SERVER, FIELD_API_TOKEN, FIELD_LCD_ROTATION,
    FIELD_NTP_SERVER, FIELD_WIFI_PASSWORD, FIELD_WIFI_SSID,
};

/// Default document path on the appliance filesystem.
pub const DEFAULT_CONFIG_PATH: &str = "/config.json";

/// Configuration manager bound to a filesystem and a secure store.
///
/// Constructed once at boot; collaborators receive string copies from
/// the getters, never references into the manager, and mutate only
/// through the setters followed by an explicit [`save`](Self::save).
pub struct ConfigManager<F: ConfigFs, R: NvsRegion> {
    fs: F,
    store: SecureStore<R>,
    path: String,
    display: DisplaySettings,
    ntp_server: Option<String>,
    ssid: String,
    password: String,
    api_token: String,
}

impl<F: ConfigFs, R: NvsRegion> ConfigManager<F, R> {
    /// Creates a manager for the document at `path`.
    ///
    /// Nothing is read here; call [`load`](Self::load). Until then every
    /// field reports its compiled-in default.
    #[must_use]
    pub fn new(fs: F, store: SecureStore<R>, path: impl Into<String>) -> Self {
        Self {
            fs,
            store,
            path: path.into(),
            display: DisplaySettings::default(),
            ntp_server: None,
            ssid: String::new(),
            password: String::new(),
            api_token: String::new(),
        }
    }

    /// Loads the document and reconciles secrets with the secure store.
    ///
    /// Plaintext fields fall back to compiled-in defaults when missing.
    /// Secret fields still present in the document are migrated into the
    /// store (see [`migrate_secrets_to_store`](Self::migrate_secrets_to_store));
    /// afterwards the in-memory secrets mirror the store.
    ///
    /// # Errors
    ///
    /// Fails when the filesystem cannot be mounted, the document is
    /// missing, empty, or malformed, or a migration write fails. The
    /// caller decides severity; every field keeps a usable value either
    /// way.
    pub fn load(&mut self) -> ConfigResult<()> {
        if let Err(err) = self.fs.mount() {
            error!("cannot mount configuration filesystem: {err}");
            return Err(err);
        }

        let bytes = self
            .fs
            .read(&self.path)?
            .ok_or_else(|| ConfigError::Missing {
                path: self.path.clone(),
            })?;
        if bytes.is_empty() {
            warn!("configuration file {} is empty", self.path);
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let doc: Map<String, Value> = serde_json::from_slice(&bytes)?;

        self.display = DisplaySettings::from_document(&doc);
        self.ntp_server = str_field(&doc, FIELD_NTP_SERVER).filter(|s| !s.is_empty());

        // Secrets may still sit in the document on a device that has
        // never migrated.
        let doc_ssid = str_field(&doc, FIELD_WIFI_SSID).unwrap_or_default();
        let doc_password = str_field(&doc, FIELD_WIFI_PASSWORD).unwrap_or_default();
        let doc_token = str_field(&doc, FIELD_API_TOKEN).unwrap_or_default();

        let migrated = self.migrate_secrets_to_store(&doc_ssid, &doc_password, &doc_token)?;
        if !migrated {
            self.refresh_secrets_from_store();
        }

        Ok(())
    }

    /// Persists secrets to the store, then plaintext fields to the
    /// document.
    ///
    /// All secret fields go to the store in one batched flush. The
    /// document is fully built in memory, contains no secret fields, and
    /// atomically replaces the previous file.
    ///
    /// # Errors
    ///
    /// Fails when the filesystem cannot be mounted, the store flush
    /// fails, or the document cannot be written; the previous document
    /// stays in place on any failure.
    pub fn save(&mut self) -> ConfigResult<()> {
        if let Err(err) = self.fs.mount() {
            error!("cannot mount configuration filesystem: {err}");
            return Err(err);
        }

        self.store.put_many([
            (FIELD_WIFI_SSID, self.ssid.as_str()),
            (FIELD_WIFI_PASSWORD, self.password.as_str()),
            (FIELD_API_TOKEN, self.api_token.as_str()),
        ])?;

        let mut doc = Map::new();
        doc.insert(
            FIELD_LCD_ROTATION.to_string(),
            Value::from(self.display.rotation),
        );
        if let Some(server) = &self.ntp_server {
            doc.insert(FIELD_NTP_SERVER.to_string(), Value::String(server.clone()));
        }

        let bytes = serde_json::to_vec(&Value::Object(doc))?;
        self.fs.write_atomic(&self.path, &bytes)?;
        info!("configuration saved to {}", self.path);
        Ok(())
    }

    /// Moves plaintext secret values into the secure store, per field.
    ///
    /// A field migrates only when its plaintext value is non-empty and
    /// the store holds nothing for it. When anything migrated, the
    /// in-memory secrets are refreshed from the store and the document
    /// is rewritten without secret fields, completing the removal.
    ///
    /// Idempotent: a second call finds the store populated and does
    /// nothing. Callable on demand with values from any legacy source,
    /// not just during [`load`](Self::load).
    ///
    /// Returns whether any field migrated.
    ///
    /// # Errors
    ///
    /// Fails when the store flush or the document rewrite fails. The
    /// plaintext document is only rewritten *after* the store write
    /// succeeded, so no secret is ever lost to a failed migration.
    pub fn migrate_secrets_to_store(
        &mut self,
        ssid: &str,
        password: &str,
        api_token: &str,
    ) -> ConfigResult<bool> {
        let mut pending: Vec<(&str, &str)> = Vec::new();
        for (field, value) in [
            (FIELD_WIFI_SSID, ssid),
            (FIELD_WIFI_PASSWORD, password),
            (FIELD_API_TOKEN, api_token),
        ] {
            if !value.is_empty() && self.store.get_or(field, "").is_empty() {
                pending.push((field, value));
            }
        }
        if pending.is_empty() {
            return Ok(false);
        }

        let count = pending.len();
        self.store.put_many(pending)?;
        self.refresh_secrets_from_store();
        self.save()?;
        info!("migrated {count} secret field(s) to the secure store");
        Ok(true)
    }

    /// Mirrors the secret fields from the store, which is authoritative
    /// once it holds any value.
    fn refresh_secrets_from_store(&mut self) {
        self.ssid = self.store.get_or(FIELD_WIFI_SSID, "");
        self.password = self.store.get_or(FIELD_WIFI_PASSWORD, "");
        self.api_token = self.store.get_or(FIELD_API_TOKEN, "");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the display settings.
    #[must_use]
    pub const fn display(&self) -> &DisplaySettings {
        &self.display
    }

    /// Returns the configured NTP server, if any.
    #[must_use]
    pub fn ntp_server(&self) -> Option<&str> {
        self.ntp_server.as_deref()
    }

    /// Returns the configured NTP server, or the compiled-in fallback.
    #[must_use]
    pub fn ntp_server_or_default(&self) -> &str {
        self.ntp_server.as_deref().unwrap_or(DEFAULT_NTP_SERVER)
    }

    /// Sets the NTP server; an empty string clears the override.
    pub fn set_ntp_server(&mut self, server: &str) {
        self.ntp_server = if server.is_empty() {
            None
        } else {
            Some(server.to_string())
        };
    }

    /// Returns the WiFi network name.
    #[must_use]
    pub fn wifi_ssid(&self) -> &str {
        &self.ssid
    }

    /// Returns the WiFi passphrase.
    #[must_use]
    pub fn wifi_password(&self) -> &str {
        &self.password
    }

    /// Sets the WiFi credentials in memory.
    pub fn set_wifi(&mut self, ssid: &str, password: &str) {
        self.ssid = ssid.to_string();
        self.password = password.to_string();
    }

    /// Returns the web API token.
    #[must_use]
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Sets the web API token in memory.
    pub fn set_api_token(&mut self, token: &str) {
        self.api_token = token.to_string();
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the secure store for direct access.
    pub fn store_mut(&mut self) -> &mut SecureStore<R> {
        &mut self.store
    }

    /// Consumes the manager and returns the filesystem and store.
    ///
    /// Restart simulations rebuild a manager from the same parts.
    #[must_use]
    pub fn into_parts(self) -> (F, SecureStore<R>) {
        (self.fs, self.store)
    }
}
