//! Error types for paramvault
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::time::Duration;

use thiserror::Error;

/// Main error type for paramvault
#[derive(Error, Debug)]
pub enum Error {
    /// Remote service was not discovered within the configured window
    #[error("Discovery of '{service}' timed out after {waited:?}")]
    DiscoveryTimeout { service: String, waited: Duration },

    /// mDNS daemon or registration failure
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// HTTP or parse failure while reading the remote parameter tree
    #[error("Remote query error: {0}")]
    RemoteQuery(String),

    /// Requested snapshot key absent
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// Stored snapshot cannot be parsed into the expected shape
    #[error("Snapshot corrupt: {0}")]
    Corrupt(String),

    /// Snapshot storage I/O failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// OSC encode/decode or socket failure
    #[error("OSC error: {0}")]
    Osc(String),

    /// Remote endpoint or avatar identity not yet known
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error (sockets, listeners)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteQuery(err.to_string())
    }
}

/// Convenience Result type using paramvault Error
pub type Result<T> = std::result::Result<T, Error>;
