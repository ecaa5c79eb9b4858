//! SAML library configuration.
//!
//! Loaded from TOML (or built in code) and turned into a protocol context by
//! `saml-protocol`. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! clock_skew_seconds = 120
//! signature_algorithm = "rsa-sha512"
//! canonicalization = "exclusive-c14n"
//! algorithm_blacklist = ["http://www.w3.org/2000/09/xmldsig#rsa-sha1"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithm::{
    AlgorithmPolicy, CanonicalizationAlgorithm, ContentEncryptionAlgorithm, KeyTransportAlgorithm,
    SignatureAlgorithm,
};
use crate::error::ConfigError;

/// Library configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamlConfig {
    /// Algorithm URIs that must never be accepted or produced.
    pub algorithm_blacklist: Vec<String>,
    /// Allowed clock skew when evaluating `NotBefore` / `NotOnOrAfter`.
    pub clock_skew_seconds: i64,
    /// Signature algorithm used when signing.
    pub signature_algorithm: SignatureAlgorithm,
    /// Canonicalization method used when signing.
    pub canonicalization: CanonicalizationAlgorithm,
    /// Key transport algorithm used when encrypting.
    pub key_transport: KeyTransportAlgorithm,
    /// Content encryption algorithm used when encrypting.
    pub content_encryption: ContentEncryptionAlgorithm,
}

impl Default for SamlConfig {
    fn default() -> Self {
        Self {
            algorithm_blacklist: AlgorithmPolicy::default().iter().map(String::from).collect(),
            clock_skew_seconds: 180,
            signature_algorithm: SignatureAlgorithm::RsaSha256,
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14n,
            key_transport: KeyTransportAlgorithm::RsaOaepMgf1p,
            content_encryption: ContentEncryptionAlgorithm::Aes256Gcm,
        }
    }
}

impl SamlConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading SAML configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks that the configured defaults are consistent with the blacklist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_skew_seconds < 0 {
            return Err(ConfigError::Invalid(
                "clock_skew_seconds must not be negative".to_string(),
            ));
        }

        let policy = self.policy();
        for uri in [
            self.signature_algorithm.uri(),
            self.key_transport.uri(),
            self.content_encryption.uri(),
        ] {
            if policy.is_blacklisted(uri) {
                return Err(ConfigError::Invalid(format!(
                    "default algorithm is blacklisted: {uri}"
                )));
            }
        }

        Ok(())
    }

    /// The blacklist as an [`AlgorithmPolicy`].
    #[must_use]
    pub fn policy(&self) -> AlgorithmPolicy {
        AlgorithmPolicy::from_uris(self.algorithm_blacklist.iter().cloned())
    }

    /// Clock skew as a duration.
    #[must_use]
    pub fn clock_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.clock_skew_seconds)
    }
}
