//! Batch formation (§4.6): group contiguous unbatched events, build a binary
//! Merkle tree over their leaf hashes, and sign the root.

use crate::config::Config;
use crate::error::Result;
use crate::store::Store;
use authority_types::crypto::{jcs, sha256, sign_payload};
use authority_types::{BatchSource, CoreError, LedgerEvent, MerkleRoot};
use chrono::Utc;
use p256::ecdsa::SigningKey;
use uuid::Uuid;

/// Payload type bound into a Merkle root's signature PAE envelope.
pub const MERKLE_ROOT_PAYLOAD_TYPE: &str = "caracal.merkle_root.v1";

/// Domain-separating prefix for internal tree nodes, so a parent hash can
/// never be confused with a leaf hash of the same bytes.
const PARENT_DOMAIN: &[u8] = b"caracal:merkle:parent";

pub(crate) fn leaf_hash(event: &LedgerEvent) -> std::result::Result<[u8; 32], CoreError> {
    let bytes = jcs::to_vec(&event.leaf_input())
        .map_err(|e| CoreError::Crypto(format!("failed to canonicalize ledger leaf: {e}")))?;
    Ok(sha256(&bytes))
}

pub(crate) fn parent_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(PARENT_DOMAIN.len() + 64);
    buf.extend_from_slice(PARENT_DOMAIN);
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    sha256(&buf)
}

/// Fold a list of leaves up to a single root, duplicating the odd leaf at
/// each level (§4.6 step 3).
pub(crate) fn compute_merkle_root(leaves: &[[u8; 32]]) -> Option<[u8; 32]> {
    if leaves.is_empty() {
        return None;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|chunk| match chunk {
                [left, right] => parent_hash(left, right),
                [solo] => parent_hash(solo, solo),
                _ => unreachable!(),
            })
            .collect();
    }
    level.into_iter().next()
}

/// Build and sign a Merkle root over `events`. Does not persist anything;
/// callers commit the result via [`Store::commit_merkle_batch`].
pub fn form_batch(
    events: &[LedgerEvent],
    source: BatchSource,
    signing_key: &SigningKey,
) -> std::result::Result<MerkleRoot, CoreError> {
    if events.is_empty() {
        return Err(CoreError::InvalidInput("cannot form a batch over zero events".into()));
    }

    let leaves = events
        .iter()
        .map(leaf_hash)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let root = compute_merkle_root(&leaves)
        .expect("non-empty leaf set always yields a root");

    let signature = sign_payload(MERKLE_ROOT_PAYLOAD_TYPE, &root, signing_key)
        .map_err(|e| CoreError::Crypto(format!("failed to sign merkle root: {e}")))?;

    Ok(MerkleRoot {
        root_id: Uuid::new_v4(),
        batch_id: Uuid::new_v4(),
        merkle_root: root,
        signature,
        event_count: events.len() as u32,
        first_event_id: events.first().unwrap().event_id,
        last_event_id: events.last().unwrap().event_id,
        source,
        created_at: Utc::now(),
    })
}

/// Pull the next batch from `store` if the size or time trigger has fired,
/// sign it, and commit it atomically. Returns `None` if no trigger has fired.
pub fn try_form_next_batch(
    store: &Store,
    config: &Config,
    signing_key: &SigningKey,
) -> Result<Option<MerkleRoot>> {
    let after = store.last_batched_event_id()?;
    let pending = store.unbatched_events(after, config.batch_size as u32 + 1)?;

    if pending.is_empty() {
        return Ok(None);
    }

    let size_triggered = pending.len() >= config.batch_size;
    let time_triggered = Utc::now().signed_duration_since(pending[0].timestamp).num_seconds()
        >= config.batch_interval_seconds;

    if !size_triggered && !time_triggered {
        return Ok(None);
    }

    let batch = &pending[..pending.len().min(config.batch_size)];
    let root = form_batch(batch, BatchSource::Live, signing_key)?;
    store.commit_merkle_batch(&root)?;
    Ok(Some(root))
}

/// Batch every remaining unbatched event in one shot, regardless of the size
/// or time trigger (SPEC_FULL §10.5): used to finalize a historical backfill
/// or migration run, where the live triggers don't apply.
pub fn close_migration_batch(store: &Store, signing_key: &SigningKey) -> Result<Option<MerkleRoot>> {
    let after = store.last_batched_event_id()?;
    let pending = store.unbatched_events(after, u32::MAX)?;
    if pending.is_empty() {
        return Ok(None);
    }
    let root = form_batch(&pending, BatchSource::Migration, signing_key)?;
    store.commit_merkle_batch(&root)?;
    Ok(Some(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use authority_types::crypto::keys::{generate_keypair, signing_key_from_pem};
    use authority_types::{Decision, EventType};
    use serde_json::Map;

    fn event(event_id: i64) -> LedgerEvent {
        LedgerEvent {
            event_id,
            event_type: EventType::Validated,
            timestamp: Utc::now(),
            principal_id: Uuid::new_v4(),
            mandate_id: None,
            decision: Some(Decision::Allowed),
            denial_reason: None,
            requested_action: Some("api_call".into()),
            requested_resource: Some("api:openai:gpt-4".into()),
            event_metadata: Map::new(),
            correlation_id: None,
            merkle_root_id: None,
        }
    }

    #[test]
    fn root_is_deterministic_for_same_events() {
        let events = vec![event(1), event(2), event(3)];
        let leaves: Vec<_> = events.iter().map(|e| leaf_hash(e).unwrap()).collect();
        let root_a = compute_merkle_root(&leaves).unwrap();
        let root_b = compute_merkle_root(&leaves).unwrap();
        assert_eq!(root_a, root_b);
    }

    #[test]
    fn odd_leaf_count_duplicates_last_leaf() {
        let events = vec![event(1), event(2), event(3)];
        let leaves: Vec<_> = events.iter().map(|e| leaf_hash(e).unwrap()).collect();
        let root = compute_merkle_root(&leaves).unwrap();
        let expected = parent_hash(&parent_hash(&leaves[0], &leaves[1]), &parent_hash(&leaves[2], &leaves[2]));
        assert_eq!(root, expected);
    }

    #[test]
    fn tampering_with_one_event_changes_the_root() {
        let mut events = vec![event(1), event(2)];
        let leaves: Vec<_> = events.iter().map(|e| leaf_hash(e).unwrap()).collect();
        let original_root = compute_merkle_root(&leaves).unwrap();

        events[0].requested_resource = Some("database:prod".into());
        let tampered_leaves: Vec<_> = events.iter().map(|e| leaf_hash(e).unwrap()).collect();
        let tampered_root = compute_merkle_root(&tampered_leaves).unwrap();

        assert_ne!(original_root, tampered_root);
    }

    #[test]
    fn form_batch_signs_the_root() {
        let pair = generate_keypair().unwrap();
        let signing_key = signing_key_from_pem(&pair.private_key_pem).unwrap();
        let events = vec![event(1), event(2)];

        let root = form_batch(&events, BatchSource::Live, &signing_key).unwrap();
        assert_eq!(root.event_count, 2);
        assert_eq!(root.first_event_id, 1);
        assert_eq!(root.last_event_id, 2);
        assert!(!root.signature.is_empty());
    }

    #[test]
    fn form_batch_rejects_empty_input() {
        let pair = generate_keypair().unwrap();
        let signing_key = signing_key_from_pem(&pair.private_key_pem).unwrap();
        assert!(form_batch(&[], BatchSource::Live, &signing_key).is_err());
    }
}
