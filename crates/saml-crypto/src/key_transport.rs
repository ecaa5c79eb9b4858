//! RSA-OAEP key transport.
//!
//! Wraps the ephemeral content key for a recipient certificate and unwraps it
//! with the matching PKCS#8 private key. RSA PKCS#1 v1.5 is refused.

use std::fmt;

use aws_lc_rs::rsa::{
    OaepAlgorithm, OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey,
    PublicEncryptingKey, OAEP_SHA1_MGF1SHA1, OAEP_SHA256_MGF1SHA256,
};
use saml_core::{CryptoError, KeyTransportAlgorithm, KeyUnwrapper, KeyWrapper};
use x509_parser::prelude::{FromDer, X509Certificate};

fn oaep_algorithm(algorithm: KeyTransportAlgorithm) -> Result<&'static OaepAlgorithm, CryptoError> {
    match algorithm {
        KeyTransportAlgorithm::RsaOaepMgf1p => Ok(&OAEP_SHA1_MGF1SHA1),
        KeyTransportAlgorithm::RsaOaepSha256 => Ok(&OAEP_SHA256_MGF1SHA256),
        KeyTransportAlgorithm::Rsa15 => Err(CryptoError::UnsupportedAlgorithm(
            "RSA PKCS#1 v1.5 key transport".to_string(),
        )),
    }
}

/// Public-key side of RSA-OAEP key transport.
pub struct RsaKeyWrapper {
    key: OaepPublicEncryptingKey,
    algorithm: KeyTransportAlgorithm,
    recipient: Option<String>,
}

impl RsaKeyWrapper {
    /// Builds a wrapper from a DER `SubjectPublicKeyInfo`.
    pub fn from_spki_der(spki: &[u8], algorithm: KeyTransportAlgorithm) -> Result<Self, CryptoError> {
        oaep_algorithm(algorithm)?;
        let public = PublicEncryptingKey::from_der(spki)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA public key: {e}")))?;
        let key = OaepPublicEncryptingKey::new(public)
            .map_err(|e| CryptoError::InvalidKey(format!("RSA key unusable for OAEP: {e}")))?;

        Ok(Self {
            key,
            algorithm,
            recipient: None,
        })
    }

    /// Builds a wrapper from the recipient's DER certificate.
    pub fn from_certificate_der(
        der: &[u8],
        algorithm: KeyTransportAlgorithm,
    ) -> Result<Self, CryptoError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid certificate: {e}")))?;
        Self::from_spki_der(cert.public_key().raw, algorithm)
    }

    /// Builds a wrapper from the recipient's PEM certificate.
    pub fn from_certificate_pem(
        pem: &str,
        algorithm: KeyTransportAlgorithm,
    ) -> Result<Self, CryptoError> {
        Self::from_certificate_der(&crate::pem::certificate_from_pem(pem)?, algorithm)
    }

    /// Records the recipient name placed on the key envelope.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

impl fmt::Debug for RsaKeyWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyWrapper")
            .field("algorithm", &self.algorithm)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

impl KeyWrapper for RsaKeyWrapper {
    fn algorithm(&self) -> KeyTransportAlgorithm {
        self.algorithm
    }

    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let alg = oaep_algorithm(self.algorithm)?;
        let mut out = vec![0u8; self.key.ciphertext_size()];
        let wrapped = self
            .key
            .encrypt(alg, key, &mut out, None)
            .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP wrap failed: {e}")))?;
        Ok(wrapped.to_vec())
    }

    fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }
}

/// Private-key side of RSA-OAEP key transport.
pub struct RsaKeyUnwrapper {
    key: OaepPrivateDecryptingKey,
    algorithm: KeyTransportAlgorithm,
    recipient: Option<String>,
}

impl RsaKeyUnwrapper {
    /// Loads a PKCS#8 DER private key.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: KeyTransportAlgorithm) -> Result<Self, CryptoError> {
        oaep_algorithm(algorithm)?;
        let private = PrivateDecryptingKey::from_pkcs8(pkcs8_der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA private key: {e}")))?;
        let key = OaepPrivateDecryptingKey::new(private)
            .map_err(|e| CryptoError::InvalidKey(format!("RSA key unusable for OAEP: {e}")))?;

        Ok(Self {
            key,
            algorithm,
            recipient: None,
        })
    }

    /// Loads a PEM-encoded PKCS#8 private key.
    pub fn from_pem(pem: &str, algorithm: KeyTransportAlgorithm) -> Result<Self, CryptoError> {
        Self::from_pkcs8(&crate::pem::private_key_from_pem(pem)?, algorithm)
    }

    /// Recipient name used to select among several key envelopes.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

impl fmt::Debug for RsaKeyUnwrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyUnwrapper")
            .field("algorithm", &self.algorithm)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

impl KeyUnwrapper for RsaKeyUnwrapper {
    fn algorithm(&self) -> KeyTransportAlgorithm {
        self.algorithm
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let alg = oaep_algorithm(self.algorithm)?;
        let mut out = vec![0u8; self.key.min_output_size()];
        let key = self
            .key
            .decrypt(alg, wrapped, &mut out, None)
            .map_err(|_| CryptoError::Decryption)?;
        Ok(key.to_vec())
    }

    fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }
}
