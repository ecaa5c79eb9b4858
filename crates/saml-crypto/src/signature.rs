//! XML-DSig signers and a certificate-backed verifier.
//!
//! RSA uses PKCS#1 v1.5 padding. ECDSA signatures are the fixed-width
//! `r || s` encoding XML-DSig requires, not ASN.1.

use std::fmt;

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{
    self, EcdsaKeyPair, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm,
};
use saml_core::{CryptoError, DigestAlgorithm, Digester, SignatureAlgorithm, Signer, Verifier};
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::public_key::PublicKey;

use crate::digest::digest;

/// RSA private key signing with PKCS#1 v1.5 padding.
pub struct RsaSigner {
    key_pair: RsaKeyPair,
    algorithm: SignatureAlgorithm,
}

impl RsaSigner {
    /// Loads a PKCS#8 (or bare PKCS#1) DER private key.
    ///
    /// RSA-SHA1 is only ever verified, never produced.
    pub fn from_der(key_der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, CryptoError> {
        if !algorithm.is_rsa() || algorithm == SignatureAlgorithm::RsaSha1 {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{algorithm:?} cannot be produced by an RSA signer"
            )));
        }

        let key_pair = RsaKeyPair::from_pkcs8(key_der)
            .or_else(|_| RsaKeyPair::from_der(key_der))
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA key: {e}")))?;

        Ok(Self {
            key_pair,
            algorithm,
        })
    }

    /// Loads a PEM-encoded PKCS#8 private key.
    pub fn from_pem(pem: &str, algorithm: SignatureAlgorithm) -> Result<Self, CryptoError> {
        Self::from_der(&crate::pem::private_key_from_pem(pem)?, algorithm)
    }
}

impl fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Digester for RsaSigner {
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(digest(algorithm, data))
    }
}

impl Signer for RsaSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let padding = match self.algorithm {
            SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_SHA256,
            SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
            SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
            other => {
                return Err(CryptoError::UnsupportedAlgorithm(format!("{other:?}")));
            }
        };

        let rng = SystemRandom::new();
        let mut out = vec![0u8; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(padding, &rng, data, &mut out)
            .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;

        Ok(out)
    }
}

/// ECDSA private key signing.
pub struct EcdsaSigner {
    key_pair: EcdsaKeyPair,
    algorithm: SignatureAlgorithm,
}

impl EcdsaSigner {
    /// Loads a PKCS#8 DER private key for the curve implied by `algorithm`.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, CryptoError> {
        let signing_alg = match algorithm {
            SignatureAlgorithm::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            SignatureAlgorithm::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
            SignatureAlgorithm::EcdsaSha512 => &signature::ECDSA_P521_SHA512_FIXED_SIGNING,
            other => {
                return Err(CryptoError::UnsupportedAlgorithm(format!(
                    "{other:?} is not an ECDSA algorithm"
                )));
            }
        };

        let key_pair = EcdsaKeyPair::from_pkcs8(signing_alg, pkcs8_der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid ECDSA PKCS#8 key: {e}")))?;

        Ok(Self {
            key_pair,
            algorithm,
        })
    }

    /// Loads a PEM-encoded PKCS#8 private key.
    pub fn from_pem(pem: &str, algorithm: SignatureAlgorithm) -> Result<Self, CryptoError> {
        Self::from_pkcs8(&crate::pem::private_key_from_pem(pem)?, algorithm)
    }
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Digester for EcdsaSigner {
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(digest(algorithm, data))
    }
}

impl Signer for EcdsaSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let rng = SystemRandom::new();
        let sig = self
            .key_pair
            .sign(&rng, data)
            .map_err(|e| CryptoError::Signing(format!("ECDSA signing failed: {e}")))?;
        Ok(sig.as_ref().to_vec())
    }
}

/// Verifies signatures with the public key of an X.509 certificate.
///
/// The certificate is only used as a key container; no chain, validity
/// period or revocation check happens here.
#[derive(Clone)]
pub struct CertificateVerifier {
    public_key: Vec<u8>,
    algorithm: SignatureAlgorithm,
}

impl CertificateVerifier {
    /// Builds a verifier from a DER certificate.
    ///
    /// Fails if the certificate's key type does not match `algorithm`.
    pub fn from_certificate_der(
        der: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<Self, CryptoError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid certificate: {e}")))?;
        let spki = cert.public_key();

        let key_matches = match spki.parsed() {
            Ok(PublicKey::RSA(_)) => algorithm.is_rsa(),
            Ok(PublicKey::EC(_)) => algorithm.is_ecdsa(),
            _ => false,
        };
        if !key_matches {
            return Err(CryptoError::InvalidKey(format!(
                "certificate key type does not match {algorithm:?}"
            )));
        }

        Ok(Self {
            public_key: spki.subject_public_key.data.to_vec(),
            algorithm,
        })
    }

    /// Builds a verifier from a PEM certificate.
    pub fn from_certificate_pem(
        pem: &str,
        algorithm: SignatureAlgorithm,
    ) -> Result<Self, CryptoError> {
        Self::from_certificate_der(&crate::pem::certificate_from_pem(pem)?, algorithm)
    }

    fn verification_algorithm(&self) -> &'static dyn VerificationAlgorithm {
        match self.algorithm {
            SignatureAlgorithm::RsaSha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
            SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
            SignatureAlgorithm::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED,
            SignatureAlgorithm::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED,
            SignatureAlgorithm::EcdsaSha512 => &signature::ECDSA_P521_SHA512_FIXED,
        }
    }
}

impl fmt::Debug for CertificateVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateVerifier")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Digester for CertificateVerifier {
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(digest(algorithm, data))
    }
}

impl Verifier for CertificateVerifier {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn verify(&self, data: &[u8], sig: &[u8]) -> Result<bool, CryptoError> {
        let public_key = UnparsedPublicKey::new(self.verification_algorithm(), &self.public_key);
        match public_key.verify(data, sig) {
            Ok(()) => Ok(true),
            Err(_) => {
                tracing::debug!(algorithm = ?self.algorithm, "signature did not verify");
                Ok(false)
            }
        }
    }
}
