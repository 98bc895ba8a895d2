//! Error types for the signal monitor core.
//!
//! Malformed pin identifiers and unmappable conversions are not errors:
//! the resolver answers those with fallbacks and the
//! [`NO_MAPPING`](crate::pins::NO_MAPPING) sentinel.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the registry, the decoder boundary and configuration loading.
#[derive(Debug, Error)]
pub enum Error {
    /// The signal decoder refused to start monitoring a channel.
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// The decoder has been shut down and accepts no new channels.
    #[error("Decoder unavailable: {0}")]
    DecoderUnavailable(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(format!("Invalid TOML: {}", e))
    }
}
