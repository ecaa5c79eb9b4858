//! # saml-core
//!
//! Foundational pieces shared by the SAML 2.0 crates:
//!
//! - [`algorithm`] - XML-DSig / XML-Enc algorithm identifiers and the blacklist policy
//! - [`capability`] - traits through which cryptographic primitives are injected
//! - [`clock`] - the time source used for validity checks
//! - [`config`] - serde/TOML configuration
//! - [`error`] - error types for the above
//!
//! Nothing in this crate performs cryptography itself. Concrete signers,
//! verifiers and ciphers live in `saml-crypto` (or any other crate that
//! implements the traits in [`capability`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod capability;
pub mod clock;
pub mod config;
pub mod error;

pub use algorithm::{
    AlgorithmPolicy, CanonicalizationAlgorithm, ContentEncryptionAlgorithm, DigestAlgorithm,
    KeyTransportAlgorithm, SignatureAlgorithm,
};
pub use capability::{ContentCipher, Digester, KeyUnwrapper, KeyWrapper, Signer, Verifier};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SamlConfig;
pub use error::{AlgorithmError, ConfigError, CryptoError};
