//! DSSE-style pre-authentication encoding (PAE) and ECDSA P-256 signing.
//!
//! Signatures never cover the raw canonical payload bytes directly; they
//! cover a PAE envelope binding the payload to its declared type, so a
//! signature produced for one payload type can never be replayed as if it
//! signed a different kind of content.

use anyhow::{anyhow, Context, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Build the DSSEv1 pre-authentication encoding for `(payload_type, payload)`.
///
/// `"DSSEv1" SP LEN(type) SP type SP LEN(payload) SP payload`
pub fn build_pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload_type.len() + 32);
    out.extend_from_slice(b"DSSEv1");
    out.push(b' ');
    out.extend_from_slice(payload_type.len().to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload_type.as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload);
    out
}

/// Sign a canonical payload under the given payload type, returning the raw
/// fixed-size ECDSA signature bytes (r || s).
pub fn sign_payload(
    payload_type: &str,
    canonical_payload: &[u8],
    signing_key: &SigningKey,
) -> Result<Vec<u8>> {
    let pae = build_pae(payload_type, canonical_payload);
    let signature: Signature = signing_key.sign(&pae);
    Ok(signature.to_vec())
}

/// Verify a signature produced by [`sign_payload`].
///
/// Returns `Ok(false)` on a verification failure; only returns `Err` when the
/// signature bytes themselves are malformed.
pub fn verify_payload(
    payload_type: &str,
    canonical_payload: &[u8],
    signature_bytes: &[u8],
    verifying_key: &VerifyingKey,
) -> Result<bool> {
    let signature = Signature::from_slice(signature_bytes)
        .map_err(|e| anyhow!("malformed ECDSA signature: {e}"))?;
    let pae = build_pae(payload_type, canonical_payload);
    Ok(verifying_key.verify(&pae, &signature).is_ok())
}

/// Parse raw signature bytes, surfacing a typed error on malformed input.
pub fn parse_signature(signature_bytes: &[u8]) -> Result<Signature> {
    Signature::from_slice(signature_bytes).context("malformed ECDSA signature bytes")
}
