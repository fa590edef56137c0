//! Snapshot and recovery (§4.8): a lightweight checkpoint so recovery doesn't
//! have to replay the entire ledger.

use crate::error::Result;
use crate::store::{EventFilter, Store};
use authority_types::{LedgerEvent, LedgerSnapshot};
use chrono::{DateTime, Utc};
use serde_json::Map;
use uuid::Uuid;

/// Result of [`recover_from_snapshot`]: the snapshot recovery resumed from,
/// and the events that make up the replay set.
#[derive(Debug, Clone)]
pub struct RecoveryResult {
    pub snapshot_id: Uuid,
    pub replay_from_timestamp: DateTime<Utc>,
    pub replayed_events: Vec<LedgerEvent>,
}

/// Capture `{now, count(events), latest root}` and persist it.
pub fn create_snapshot(store: &Store, now: DateTime<Utc>) -> Result<LedgerSnapshot> {
    let total_events = store.query_events(&EventFilter::default())?.len() as i64;
    let merkle_root = store
        .list_merkle_roots()?
        .last()
        .map(|r| r.merkle_root)
        .unwrap_or([0u8; 32]);

    let snapshot = LedgerSnapshot {
        snapshot_id: Uuid::new_v4(),
        snapshot_timestamp: now,
        total_events,
        merkle_root,
        snapshot_data: Map::new(),
        created_at: now,
    };
    store.insert_snapshot(&snapshot)?;
    Ok(snapshot)
}

/// Load `snapshot_id` and identify every event with `timestamp >
/// snapshot_timestamp`, in `event_id` order, as the replay set. Replay is
/// idempotent: events are already durable, so "replaying" only rebuilds
/// derived state external to this crate (caches, indices) — this function
/// just identifies what that state must be rebuilt from.
pub fn recover_from_snapshot(store: &Store, snapshot_id: Uuid) -> Result<RecoveryResult> {
    let snapshot = store.get_snapshot(snapshot_id)?;
    let replayed_events = store
        .query_events(&EventFilter::default())?
        .into_iter()
        .filter(|e| e.timestamp > snapshot.snapshot_timestamp)
        .collect();

    Ok(RecoveryResult {
        snapshot_id,
        replay_from_timestamp: snapshot.snapshot_timestamp,
        replayed_events,
    })
}

/// Delete snapshots older than `retention_days`. Never touches ledger events
/// or Merkle roots.
pub fn cleanup(store: &Store, retention_days: i64, now: DateTime<Utc>) -> Result<u64> {
    store.cleanup_snapshots(retention_days, now)
}
