//! Plaintext settings: field names, compiled-in defaults, and document
//! extraction.
//!
//! Every field is read leniently: missing, null, or mistyped values fall
//! back to the compiled-in default for that field, so a hand-edited
//! document can never brick the display bring-up.

// Docs use device-speak (WiFi, GPIO pin names, lcd_* field names).
#![allow(clippy::doc_markdown)]

use serde_json::{Map, Value};

/// Document field and store key for the WiFi network name.
pub const FIELD_WIFI_SSID: &str = "wifi_ssid";

/// Document field and store key for the WiFi passphrase.
pub const FIELD_WIFI_PASSWORD: &str = "wifi_password";

/// Document field and store key for the web API token.
pub const FIELD_API_TOKEN: &str = "api_token";

/// Document field for the NTP server override.
pub const FIELD_NTP_SERVER: &str = "ntp_server";

/// Document field for the persisted display rotation.
pub const FIELD_LCD_ROTATION: &str = "lcd_rotation";

/// Fallback NTP server for callers that need one even when the field is
/// unset.
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";

/// Default display rotation for the stock panel orientation.
pub const DEFAULT_LCD_ROTATION: u8 = 4;

/// Default SPI clock for the panel, in hertz.
pub const DEFAULT_LCD_SPI_HZ: u32 = 40_000_000;

// =============================================================================
// DisplaySettings
// =============================================================================

/// Display bring-up parameters from the plaintext document.
///
/// Only `rotation` is written back on save; the rest describe fixed
/// board wiring and are read-only overrides for non-stock panels.
// The bools are independent wiring polarities, not a state encoding.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Whether the panel is driven at all.
    pub enabled: bool,
    /// Panel width in pixels.
    pub width: i16,
    /// Panel height in pixels.
    pub height: i16,
    /// Panel rotation setting.
    pub rotation: u8,
    /// GPIO for SPI MOSI.
    pub mosi_gpio: i8,
    /// GPIO for SPI SCK.
    pub sck_gpio: i8,
    /// GPIO for SPI chip select.
    pub cs_gpio: i8,
    /// GPIO for the data/command line.
    pub dc_gpio: i8,
    /// GPIO for panel reset.
    pub rst_gpio: i8,
    /// Whether chip select is active high.
    pub cs_active_high: bool,
    /// Whether the data/command line signals a command when high.
    pub dc_cmd_high: bool,
    /// SPI mode (0 through 3).
    pub spi_mode: u8,
    /// Whether chip select stays asserted between transfers.
    pub keep_cs_asserted: bool,
    /// SPI clock in hertz.
    pub spi_hz: u32,
    /// GPIO for the backlight.
    pub backlight_gpio: i8,
    /// Whether the backlight GPIO is active low.
    pub backlight_active_low: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 240,
            height: 240,
            rotation: DEFAULT_LCD_ROTATION,
            mosi_gpio: 13,
            sck_gpio: 14,
            cs_gpio: 15,
            dc_gpio: 0,
            rst_gpio: 2,
            cs_active_high: true,
            dc_cmd_high: false,
            spi_mode: 0,
            keep_cs_asserted: true,
            spi_hz: DEFAULT_LCD_SPI_HZ,
            backlight_gpio: 5,
            backlight_active_low: true,
        }
    }
}

impl DisplaySettings {
    /// Reads display fields from a parsed document, defaulting each
    /// missing or mistyped field independently.
    #[must_use]
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            enabled: bool_field(doc, "lcd_enable", d.enabled),
            width: int_field(doc, "lcd_w", d.width),
            height: int_field(doc, "lcd_h", d.height),
            rotation: int_field(doc, FIELD_LCD_ROTATION, d.rotation),
            mosi_gpio: int_field(doc, "lcd_mosi_gpio", d.mosi_gpio),
            sck_gpio: int_field(doc, "lcd_sck_gpio", d.sck_gpio),
            cs_gpio: int_field(doc, "lcd_cs_gpio", d.cs_gpio),
            dc_gpio: int_field(doc, "lcd_dc_gpio", d.dc_gpio),
            rst_gpio: int_field(doc, "lcd_rst_gpio", d.rst_gpio),
            cs_active_high: bool_field(doc, "lcd_cs_active_high", d.cs_active_high),
            dc_cmd_high: bool_field(doc, "lcd_dc_cmd_high", d.dc_cmd_high),
            spi_mode: int_field(doc, "lcd_spi_mode", d.spi_mode),
            keep_cs_asserted: bool_field(doc, "lcd_keep_cs_asserted", d.keep_cs_asserted),
            spi_hz: int_field(doc, "lcd_spi_hz", d.spi_hz),
            backlight_gpio: int_field(doc, "lcd_backlight_gpio", d.backlight_gpio),
            backlight_active_low: bool_field(doc, "lcd_backlight_active_low", d.backlight_active_low),
        }
    }

    /// Returns the SPI clock, substituting the default for an unusable
    /// zero value.
    #[must_use]
    pub const fn effective_spi_hz(&self) -> u32 {
        if self.spi_hz == 0 {
            DEFAULT_LCD_SPI_HZ
        } else {
            self.spi_hz
        }
    }
}

fn bool_field(doc: &Map<String, Value>, key: &str, default: bool) -> bool {
    doc.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn int_field<T: TryFrom<i64>>(doc: &Map<String, Value>, key: &str, default: T) -> T {
    doc.get(key)
        .and_then(Value::as_i64)
        .and_then(|raw| T::try_from(raw).ok())
        .unwrap_or(default)
}

/// Reads a string field, if present and actually a string.
pub(crate) fn str_field(doc: &Map<String, Value>, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_document_yields_all_defaults() {
        assert_eq!(
            DisplaySettings::from_document(&parse("{}")),
            DisplaySettings::default()
        );
    }

    #[test]
    fn present_fields_override_defaults() {
        let settings =
            DisplaySettings::from_document(&parse(r#"{"lcd_rotation":2,"lcd_spi_hz":1000000}"#));
        assert_eq!(settings.rotation, 2);
        assert_eq!(settings.spi_hz, 1_000_000);
        assert_eq!(settings.width, 240);
    }

    #[test]
    fn mistyped_field_falls_back_to_its_default() {
        let settings =
            DisplaySettings::from_document(&parse(r#"{"lcd_rotation":"sideways","lcd_w":500}"#));
        assert_eq!(settings.rotation, DEFAULT_LCD_ROTATION);
        assert_eq!(settings.width, 500);
    }

    #[test]
    fn out_of_range_int_falls_back() {
        let settings = DisplaySettings::from_document(&parse(r#"{"lcd_rotation":300}"#));
        assert_eq!(settings.rotation, DEFAULT_LCD_ROTATION);
    }

    #[test]
    fn effective_spi_hz_substitutes_default_for_zero() {
        let stalled = DisplaySettings {
            spi_hz: 0,
            ..DisplaySettings::default()
        };
        assert_eq!(stalled.effective_spi_hz(), DEFAULT_LCD_SPI_HZ);

        let tuned = DisplaySettings {
            spi_hz: 8_000_000,
            ..DisplaySettings::default()
        };
        assert_eq!(tuned.effective_spi_hz(), 8_000_000);
    }

    #[test]
    fn str_field_ignores_non_strings() {
        let doc = parse(r#"{"a":"x","b":7}"#);
        assert_eq!(str_field(&doc, "a").as_deref(), Some("x"));
        assert_eq!(str_field(&doc, "b"), None);
        assert_eq!(str_field(&doc, "c"), None);
    }
}
