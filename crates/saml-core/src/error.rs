//! Error types for algorithm policy, cryptographic capabilities and configuration.
//!
//! Messages never carry key material or plaintext.

use thiserror::Error;

/// Error raised by an [`AlgorithmPolicy`](crate::AlgorithmPolicy) check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgorithmError {
    /// The algorithm is on the blacklist.
    #[error("algorithm is blacklisted: {0}")]
    Blacklisted(String),

    /// The algorithm URI is not known.
    #[error("unknown algorithm: {0}")]
    Unknown(String),
}

/// Error type for capability implementations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Encryption or key wrapping failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption or key unwrapping failed.
    ///
    /// Deliberately carries no detail.
    #[error("decryption failed")]
    Decryption,

    /// Algorithm not supported by this implementation.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration was parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
