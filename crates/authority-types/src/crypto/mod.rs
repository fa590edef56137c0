//! Cryptographic primitives: canonical JSON, key material, signing, hashing.

pub mod hash;
pub mod jcs;
pub mod keys;
pub mod sign;

pub use hash::{sha256, sha256_hex, sha256_prefixed_hex};
pub use keys::{compute_key_id, generate_keypair, keys_match, signing_key_from_pem, verifying_key_from_pem, GeneratedKeyPair};
pub use sign::{build_pae, sign_payload, verify_payload};
