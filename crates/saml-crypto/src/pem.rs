//! PEM decoding for keys and certificates.

use base64::Engine;
use saml_core::CryptoError;

/// Extracts the DER payload of the first PEM block with the given label.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem[start..].find(&end)? + start;

    let b64_data: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD
        .decode(b64_data)
        .ok()
}

/// Decodes a PKCS#8 private key (`PRIVATE KEY`) from PEM.
pub fn private_key_from_pem(pem: &str) -> Result<Vec<u8>, CryptoError> {
    pem_to_der(pem, "PRIVATE KEY")
        .ok_or_else(|| CryptoError::InvalidKey("expected a PKCS#8 PRIVATE KEY block".to_string()))
}

/// Decodes an X.509 certificate (`CERTIFICATE`) from PEM.
pub fn certificate_from_pem(pem: &str) -> Result<Vec<u8>, CryptoError> {
    pem_to_der(pem, "CERTIFICATE")
        .ok_or_else(|| CryptoError::InvalidKey("expected a CERTIFICATE block".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn decodes_fixture_blocks() {
        let key = private_key_from_pem(fixtures::IDP_KEY).unwrap();
        let cert = certificate_from_pem(fixtures::IDP_CERT).unwrap();
        // Both are DER SEQUENCEs.
        assert_eq!(key[0], 0x30);
        assert_eq!(cert[0], 0x30);
    }

    #[test]
    fn wrong_label_is_none() {
        assert!(pem_to_der(fixtures::IDP_CERT, "PRIVATE KEY").is_none());
        assert!(private_key_from_pem(fixtures::IDP_CERT).is_err());
    }
}
