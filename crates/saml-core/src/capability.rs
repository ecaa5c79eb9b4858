//! Capability traits for the cryptographic primitives the protocol layer uses.
//!
//! The protocol crate never calls a crypto library directly. Signing,
//! verification, digests, key transport and content encryption all arrive
//! through these traits, so a caller can plug in an HSM, a test double or the
//! aws-lc-rs backend from `saml-crypto`.

use crate::algorithm::{
    ContentEncryptionAlgorithm, DigestAlgorithm, KeyTransportAlgorithm, SignatureAlgorithm,
};
use crate::error::CryptoError;

/// Computes message digests.
pub trait Digester: Send + Sync {
    /// Digests `data` with the given algorithm.
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Produces signatures with a private key.
///
/// A signer is also a digester because the XML-DSig reference digest is
/// computed by the same party that signs.
pub trait Signer: Digester {
    /// The signature algorithm this signer produces.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Signs the given data.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Checks signatures against a public key.
pub trait Verifier: Digester {
    /// The signature algorithm this verifier accepts.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Returns `Ok(false)` for a well-formed but wrong signature.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError>;
}

/// Wraps a content key for one recipient (public-key side).
pub trait KeyWrapper: Send + Sync {
    /// The key transport algorithm used for wrapping.
    fn algorithm(&self) -> KeyTransportAlgorithm;

    /// Encrypts the content key for the recipient.
    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Recipient name recorded on the key envelope.
    fn recipient(&self) -> Option<&str> {
        None
    }
}

/// Recovers a wrapped content key (private-key side).
pub trait KeyUnwrapper: Send + Sync {
    /// The key transport algorithm this key accepts.
    fn algorithm(&self) -> KeyTransportAlgorithm;

    /// Decrypts a wrapped content key.
    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Recipient name used to pick among several key envelopes.
    fn recipient(&self) -> Option<&str> {
        None
    }
}

/// Symmetric content encryption.
pub trait ContentCipher: Send + Sync {
    /// Generates a fresh key for the algorithm.
    fn generate_key(&self, algorithm: ContentEncryptionAlgorithm) -> Result<Vec<u8>, CryptoError>;

    /// Encrypts `plaintext`; the result is the complete `CipherValue` payload.
    fn encrypt(
        &self,
        algorithm: ContentEncryptionAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts a `CipherValue` payload.
    fn decrypt(
        &self,
        algorithm: ContentEncryptionAlgorithm,
        key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}
