//! ECDSA P-256 key material: generation, PEM encode/decode, key-id derivation.

use anyhow::{anyhow, Context, Result};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use sha2::{Digest, Sha256};

/// A generated ECDSA P-256 keypair, PEM-encoded.
pub struct GeneratedKeyPair {
    pub private_key_pem: String,
    pub public_key_pem: String,
}

/// Generate a new ECDSA P-256 keypair.
///
/// Private key is encoded as PKCS#8 PEM; public key as SubjectPublicKeyInfo PEM.
pub fn generate_keypair() -> Result<GeneratedKeyPair> {
    let signing_key = SigningKey::random(&mut rand_core::OsRng);
    let private_key_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key as PKCS#8 PEM")?
        .to_string();
    let verifying_key = VerifyingKey::from(&signing_key);
    let public_key_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key as SPKI PEM")?;
    Ok(GeneratedKeyPair {
        private_key_pem,
        public_key_pem,
    })
}

/// Parse a PKCS#8 PEM-encoded ECDSA P-256 private key.
pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey> {
    SigningKey::from_pkcs8_pem(pem).context("failed to parse ECDSA P-256 private key PEM")
}

/// Parse a SubjectPublicKeyInfo PEM-encoded ECDSA P-256 public key.
pub fn verifying_key_from_pem(pem: &str) -> Result<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem).context("failed to parse ECDSA P-256 public key PEM")
}

/// Confirm a private key and public key PEM describe the same keypair.
pub fn keys_match(private_key_pem: &str, public_key_pem: &str) -> Result<bool> {
    let signing_key = signing_key_from_pem(private_key_pem)?;
    let from_private = VerifyingKey::from(&signing_key);
    let from_public = verifying_key_from_pem(public_key_pem)?;
    Ok(from_private == from_public)
}

/// Derive a stable key_id: lowercase hex SHA-256 of the SPKI DER encoding.
pub fn compute_key_id(public_key_pem: &str) -> Result<String> {
    let verifying_key = verifying_key_from_pem(public_key_pem)?;
    let der = verifying_key
        .to_public_key_der()
        .map_err(|e| anyhow!("failed to encode public key as SPKI DER: {e}"))?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(hex::encode(digest))
}
