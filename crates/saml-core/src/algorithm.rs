//! XML-DSig and XML-Enc algorithm identifiers.
//!
//! Each algorithm family is a closed enum with a `uri()` / `from_uri()` pair.
//! Anything outside these enums is unknown to the workspace and is rejected
//! wherever it is declared.
//!
//! [`AlgorithmPolicy`] holds the blacklist consulted before any signature or
//! encryption algorithm is used.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AlgorithmError;

/// Signature method URIs.
pub mod signature_uris {
    /// RSA with SHA-1.
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    /// RSA with SHA-256.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// RSA with SHA-384.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    /// RSA with SHA-512.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
    /// ECDSA with SHA-256.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
    /// ECDSA with SHA-384.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
    /// ECDSA with SHA-512.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";
}

/// Digest method URIs.
pub mod digest_uris {
    /// SHA-1.
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    /// SHA-256.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    /// SHA-384.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    /// SHA-512.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
}

/// Canonicalization method URIs.
pub mod canonicalization_uris {
    /// Inclusive C14N 1.0.
    pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
    /// Inclusive C14N 1.0 with comments.
    pub const C14N_WITH_COMMENTS: &str =
        "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
    /// Exclusive C14N 1.0.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    /// Exclusive C14N 1.0 with comments.
    pub const EXCLUSIVE_C14N_WITH_COMMENTS: &str =
        "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";
    /// Enveloped-signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

/// Key transport and block cipher URIs.
pub mod encryption_uris {
    /// RSA PKCS#1 v1.5 key transport.
    pub const RSA_1_5: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
    /// RSA-OAEP with MGF1/SHA-1.
    pub const RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";
    /// RSA-OAEP (XML Encryption 1.1), parameterized by digest and MGF.
    pub const RSA_OAEP: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";
    /// MGF1 with SHA-256, used inside `RSA_OAEP`.
    pub const MGF1_SHA256: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha256";
    /// AES-128 in CBC mode.
    pub const AES128_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes128-cbc";
    /// AES-256 in CBC mode.
    pub const AES256_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
    /// AES-128 in GCM mode.
    pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
    /// AES-256 in GCM mode.
    pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";
}

/// Digest algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    /// SHA-1 (legacy).
    Sha1,
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the URI for this digest algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Sha1 => digest_uris::SHA1,
            Self::Sha256 => digest_uris::SHA256,
            Self::Sha384 => digest_uris::SHA384,
            Self::Sha512 => digest_uris::SHA512,
        }
    }

    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            digest_uris::SHA1 => Some(Self::Sha1),
            digest_uris::SHA256 => Some(Self::Sha256),
            digest_uris::SHA384 => Some(Self::Sha384),
            digest_uris::SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Output length in bytes.
    #[must_use]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (recommended).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// ECDSA with SHA-512.
    EcdsaSha512,
    /// Legacy RSA with SHA-1.
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_uris::RSA_SHA256,
            Self::RsaSha384 => signature_uris::RSA_SHA384,
            Self::RsaSha512 => signature_uris::RSA_SHA512,
            Self::EcdsaSha256 => signature_uris::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_uris::ECDSA_SHA384,
            Self::EcdsaSha512 => signature_uris::ECDSA_SHA512,
            Self::RsaSha1 => signature_uris::RSA_SHA1,
        }
    }

    /// Returns the digest paired with this signature algorithm.
    #[must_use]
    pub const fn digest(&self) -> DigestAlgorithm {
        match self {
            Self::RsaSha256 | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 | Self::EcdsaSha512 => DigestAlgorithm::Sha512,
            Self::RsaSha1 => DigestAlgorithm::Sha1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_uris::RSA_SHA256 => Some(Self::RsaSha256),
            signature_uris::RSA_SHA384 => Some(Self::RsaSha384),
            signature_uris::RSA_SHA512 => Some(Self::RsaSha512),
            signature_uris::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_uris::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            signature_uris::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            signature_uris::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses RSA.
    #[must_use]
    pub const fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512 | Self::RsaSha1
        )
    }

    /// Returns true if this algorithm uses ECDSA.
    #[must_use]
    pub const fn is_ecdsa(&self) -> bool {
        matches!(
            self,
            Self::EcdsaSha256 | Self::EcdsaSha384 | Self::EcdsaSha512
        )
    }
}

/// Canonicalization algorithm selection.
///
/// The `WithComments` variants are accepted on input, but comments are never
/// part of the canonical form produced by this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalizationAlgorithm {
    /// Exclusive C14N without comments (recommended).
    #[default]
    ExclusiveC14n,
    /// Exclusive C14N with comments.
    ExclusiveC14nWithComments,
    /// Inclusive C14N without comments.
    C14n,
    /// Inclusive C14N with comments.
    C14nWithComments,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::ExclusiveC14n => canonicalization_uris::EXCLUSIVE_C14N,
            Self::ExclusiveC14nWithComments => canonicalization_uris::EXCLUSIVE_C14N_WITH_COMMENTS,
            Self::C14n => canonicalization_uris::C14N,
            Self::C14nWithComments => canonicalization_uris::C14N_WITH_COMMENTS,
        }
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            canonicalization_uris::EXCLUSIVE_C14N => Some(Self::ExclusiveC14n),
            canonicalization_uris::EXCLUSIVE_C14N_WITH_COMMENTS => {
                Some(Self::ExclusiveC14nWithComments)
            }
            canonicalization_uris::C14N => Some(Self::C14n),
            canonicalization_uris::C14N_WITH_COMMENTS => Some(Self::C14nWithComments),
            _ => None,
        }
    }

    /// Returns true for the exclusive variants.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self, Self::ExclusiveC14n | Self::ExclusiveC14nWithComments)
    }
}

/// Key transport algorithm (wrapping the ephemeral content key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyTransportAlgorithm {
    /// RSA-OAEP with SHA-1 digest and MGF1/SHA-1.
    #[default]
    RsaOaepMgf1p,
    /// XML Encryption 1.1 RSA-OAEP with SHA-256 digest and MGF1/SHA-256.
    RsaOaepSha256,
    /// RSA PKCS#1 v1.5. Recognized so it can be named and rejected.
    #[serde(rename = "rsa-1_5")]
    Rsa15,
}

impl KeyTransportAlgorithm {
    /// Returns the `EncryptionMethod` URI for this algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaOaepMgf1p => encryption_uris::RSA_OAEP_MGF1P,
            Self::RsaOaepSha256 => encryption_uris::RSA_OAEP,
            Self::Rsa15 => encryption_uris::RSA_1_5,
        }
    }

    /// Resolves an `EncryptionMethod` declaration.
    ///
    /// `digest` and `mgf` are the URIs of the optional `ds:DigestMethod` and
    /// `xenc11:MGF` children. The XML Encryption 1.1 `rsa-oaep` method is only
    /// understood with SHA-256 for both.
    #[must_use]
    pub fn from_declaration(uri: &str, digest: Option<&str>, mgf: Option<&str>) -> Option<Self> {
        match uri {
            encryption_uris::RSA_OAEP_MGF1P => match digest {
                None => Some(Self::RsaOaepMgf1p),
                Some(d) if d == digest_uris::SHA1 => Some(Self::RsaOaepMgf1p),
                Some(_) => None,
            },
            encryption_uris::RSA_OAEP => {
                let digest_ok = digest == Some(digest_uris::SHA256);
                let mgf_ok = mgf == Some(encryption_uris::MGF1_SHA256);
                (digest_ok && mgf_ok).then_some(Self::RsaOaepSha256)
            }
            encryption_uris::RSA_1_5 => Some(Self::Rsa15),
            _ => None,
        }
    }

    /// Digest method to declare inside `EncryptionMethod`, if any.
    #[must_use]
    pub const fn digest(&self) -> Option<DigestAlgorithm> {
        match self {
            Self::RsaOaepMgf1p => Some(DigestAlgorithm::Sha1),
            Self::RsaOaepSha256 => Some(DigestAlgorithm::Sha256),
            Self::Rsa15 => None,
        }
    }

    /// MGF URI to declare inside `EncryptionMethod`, if any.
    #[must_use]
    pub const fn mgf_uri(&self) -> Option<&'static str> {
        match self {
            Self::RsaOaepSha256 => Some(encryption_uris::MGF1_SHA256),
            Self::RsaOaepMgf1p | Self::Rsa15 => None,
        }
    }
}

/// Content (block) encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentEncryptionAlgorithm {
    /// AES-128-GCM.
    Aes128Gcm,
    /// AES-256-GCM.
    #[default]
    Aes256Gcm,
    /// AES-128-CBC. Recognized so it can be named and rejected.
    Aes128Cbc,
    /// AES-256-CBC. Recognized so it can be named and rejected.
    Aes256Cbc,
}

impl ContentEncryptionAlgorithm {
    /// Returns the `EncryptionMethod` URI for this algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Aes128Gcm => encryption_uris::AES128_GCM,
            Self::Aes256Gcm => encryption_uris::AES256_GCM,
            Self::Aes128Cbc => encryption_uris::AES128_CBC,
            Self::Aes256Cbc => encryption_uris::AES256_CBC,
        }
    }

    /// Parses a content encryption algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            encryption_uris::AES128_GCM => Some(Self::Aes128Gcm),
            encryption_uris::AES256_GCM => Some(Self::Aes256Gcm),
            encryption_uris::AES128_CBC => Some(Self::Aes128Cbc),
            encryption_uris::AES256_CBC => Some(Self::Aes256Cbc),
            _ => None,
        }
    }

    /// Symmetric key length in bytes.
    #[must_use]
    pub const fn key_len(&self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes128Cbc => 16,
            Self::Aes256Gcm | Self::Aes256Cbc => 32,
        }
    }
}

/// Algorithm blacklist.
///
/// Entries are algorithm URIs. The default blacklist rejects RSA-SHA1
/// signatures, RSA PKCS#1 v1.5 key transport and the CBC block modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmPolicy {
    blacklist: BTreeSet<String>,
}

impl Default for AlgorithmPolicy {
    fn default() -> Self {
        Self::from_uris([
            signature_uris::RSA_SHA1,
            encryption_uris::RSA_1_5,
            encryption_uris::AES128_CBC,
            encryption_uris::AES256_CBC,
        ])
    }
}

impl AlgorithmPolicy {
    /// A policy that blacklists nothing.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            blacklist: BTreeSet::new(),
        }
    }

    /// Builds a policy from a list of blacklisted URIs.
    pub fn from_uris<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blacklist: uris.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a URI to the blacklist.
    #[must_use]
    pub fn deny(mut self, uri: impl Into<String>) -> Self {
        self.blacklist.insert(uri.into());
        self
    }

    /// Returns true if the URI is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self, uri: &str) -> bool {
        self.blacklist.contains(uri)
    }

    /// Fails with [`AlgorithmError::Blacklisted`] if the URI is blacklisted.
    pub fn ensure_allowed(&self, uri: &str) -> Result<(), AlgorithmError> {
        if self.is_blacklisted(uri) {
            tracing::warn!(algorithm = uri, "rejecting blacklisted algorithm");
            return Err(AlgorithmError::Blacklisted(uri.to_string()));
        }
        Ok(())
    }

    /// Blacklisted URIs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.blacklist.iter().map(String::as_str)
    }
}
