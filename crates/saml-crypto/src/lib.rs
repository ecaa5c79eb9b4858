//! # saml-crypto
//!
//! aws-lc-rs backend for the capability traits declared in `saml-core`.
//!
//! | trait | implementation |
//! |---|---|
//! | `Digester` | [`AwsLcDigester`] (and every signer/verifier) |
//! | `Signer` | [`RsaSigner`], [`EcdsaSigner`] |
//! | `Verifier` | [`CertificateVerifier`] |
//! | `KeyWrapper` / `KeyUnwrapper` | [`RsaKeyWrapper`] / [`RsaKeyUnwrapper`] |
//! | `ContentCipher` | [`AesGcmCipher`] |
//!
//! Legacy algorithms (RSA PKCS#1 v1.5 key transport, AES-CBC) are named by
//! `saml-core` but refused here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod content;
pub mod digest;
pub mod key_transport;
pub mod pem;
pub mod random;
pub mod signature;

pub use content::AesGcmCipher;
pub use digest::{digest, AwsLcDigester};
pub use key_transport::{RsaKeyUnwrapper, RsaKeyWrapper};
pub use pem::{certificate_from_pem, pem_to_der, private_key_from_pem};
pub use random::random_bytes;
pub use signature::{CertificateVerifier, EcdsaSigner, RsaSigner};
