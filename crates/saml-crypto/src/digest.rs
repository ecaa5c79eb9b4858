//! Message digests.

use aws_lc_rs::digest;
use saml_core::{CryptoError, DigestAlgorithm, Digester};

/// Computes a digest of the input data.
#[must_use]
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        DigestAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        DigestAlgorithm::Sha256 => &digest::SHA256,
        DigestAlgorithm::Sha384 => &digest::SHA384,
        DigestAlgorithm::Sha512 => &digest::SHA512,
    };

    digest::digest(alg, data).as_ref().to_vec()
}

/// Stateless [`Digester`] backed by aws-lc-rs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsLcDigester;

impl Digester for AwsLcDigester {
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(digest(algorithm, data))
    }
}
