//! Cryptographically secure random bytes.

use rand::Rng;

/// Generates `len` random bytes from the thread-local CSPRNG.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_requested_length() {
        assert_eq!(random_bytes(32).len(), 32);
        assert!(random_bytes(0).is_empty());
    }

    #[test]
    fn successive_calls_differ() {
        assert_ne!(random_bytes(32), random_bytes(32));
    }
}
