#![forbid(unsafe_code)]

//! Common error type for MiniSS crates outside the channel itself.

use miniss_crypto::keystore::KeystoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinissError {
    /// I/O related failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing failures.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Static key could not be loaded or stored.
    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    /// A configured value is out of range or inconsistent.
    #[error("Invalid config value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

/// Convenient alias for results throughout MiniSS crates.
pub type MinissResult<T> = Result<T, MinissError>;
