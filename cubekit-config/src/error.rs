//! Error types for configuration loading and saving.

use thiserror::Error;

use cubekit_nvs::NvsError;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by the configuration manager.
///
/// None of these abort the firmware; the caller decides whether a
/// failure is fatal to boot (a mount failure usually is) or cosmetic
/// (fields falling back to compiled-in defaults).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The flash filesystem could not be mounted.
    #[error("filesystem unavailable: {0}")]
    Mount(String),

    /// The configuration document does not exist.
    #[error("configuration file '{path}' not found")]
    Missing {
        /// Path of the document.
        path: String,
    },

    /// The configuration document exists but is empty.
    #[error("configuration file '{path}' is empty")]
    Empty {
        /// Path of the document.
        path: String,
    },

    /// The document failed to parse or serialize.
    #[error("configuration document error: {0}")]
    Document(#[from] serde_json::Error),

    /// An I/O failure in the filesystem backend.
    #[error("filesystem i/o error while {context}: {source}")]
    Io {
        /// Context describing the operation.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A failure from the secure store holding the secret fields.
    #[error("secure store error: {0}")]
    Store(#[from] NvsError),
}

impl ConfigError {
    /// Creates an I/O error with context.
    #[must_use]
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
