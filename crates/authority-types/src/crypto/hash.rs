//! SHA-256 hashing helpers shared by mandate IDs, intent hashes, and Merkle leaves.

use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Lowercase hex SHA-256 digest, prefixed `sha256:` (content-addressed ID style).
pub fn sha256_prefixed_hex(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(sha256(bytes)))
}

/// Lowercase hex SHA-256 digest, no prefix.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_golden_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn prefixed_matches_unprefixed() {
        let bytes = b"caracal";
        assert_eq!(sha256_prefixed_hex(bytes), format!("sha256:{}", sha256_hex(bytes)));
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc"));
        assert_ne!(sha256_hex(b"abc"), sha256_hex(b"abd"));
    }
}
