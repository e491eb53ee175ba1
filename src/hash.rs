//! Content hash over canonical document text.
//!
//! Storage indexes versions by this hash, so it is always computed over the
//! exact bytes the canonical printer produced, prefixed with the digest
//! algorithm tag.

use sha2::{Digest, Sha256};

/// `"sha256:" + hex(SHA-256(text))` over the exact input bytes.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // SHA-256 of the empty string.
        assert_eq!(
            content_hash(""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_stable_and_tagged() {
        let a = content_hash("(onboarding-request)");
        let b = content_hash("(onboarding-request)");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
        assert_eq!(a.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_sensitive_to_every_byte() {
        assert_ne!(content_hash("(a)"), content_hash("(a) "));
    }
}
