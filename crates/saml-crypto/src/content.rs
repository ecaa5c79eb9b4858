//! AES-GCM content encryption.
//!
//! The `CipherValue` payload is `IV (12 bytes) || ciphertext || tag (16 bytes)`
//! as defined by XML Encryption 1.1.

use aws_lc_rs::aead::{
    Aad, Algorithm, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN,
};
use saml_core::{ContentCipher, ContentEncryptionAlgorithm, CryptoError};

use crate::random::random_bytes;

/// [`ContentCipher`] for AES-128-GCM and AES-256-GCM.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

fn aead_algorithm(algorithm: ContentEncryptionAlgorithm) -> Result<&'static Algorithm, CryptoError> {
    match algorithm {
        ContentEncryptionAlgorithm::Aes128Gcm => Ok(&AES_128_GCM),
        ContentEncryptionAlgorithm::Aes256Gcm => Ok(&AES_256_GCM),
        other => Err(CryptoError::UnsupportedAlgorithm(format!("{other:?}"))),
    }
}

fn less_safe_key(
    algorithm: ContentEncryptionAlgorithm,
    key: &[u8],
) -> Result<LessSafeKey, CryptoError> {
    let alg = aead_algorithm(algorithm)?;
    if key.len() != algorithm.key_len() {
        return Err(CryptoError::InvalidKey(format!(
            "expected a {}-byte key",
            algorithm.key_len()
        )));
    }
    let unbound = UnboundKey::new(alg, key)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
    Ok(LessSafeKey::new(unbound))
}

impl ContentCipher for AesGcmCipher {
    fn generate_key(&self, algorithm: ContentEncryptionAlgorithm) -> Result<Vec<u8>, CryptoError> {
        aead_algorithm(algorithm)?;
        Ok(random_bytes(algorithm.key_len()))
    }

    fn encrypt(
        &self,
        algorithm: ContentEncryptionAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let key = less_safe_key(algorithm, key)?;

        let iv = random_bytes(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(&iv)
            .map_err(|e| CryptoError::Encryption(format!("invalid nonce: {e}")))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

        let mut payload = iv;
        payload.extend_from_slice(&in_out);
        Ok(payload)
    }

    fn decrypt(
        &self,
        algorithm: ContentEncryptionAlgorithm,
        key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let key = less_safe_key(algorithm, key).map_err(|_| CryptoError::Decryption)?;

        if ciphertext.len() < NONCE_LEN {
            return Err(CryptoError::Decryption);
        }
        let (iv, sealed) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| CryptoError::Decryption)?;

        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decryption)?;
        Ok(plaintext.to_vec())
    }
}
