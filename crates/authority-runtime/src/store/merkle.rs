use super::Store;
use crate::error::{Result, RuntimeError};
use authority_types::{BatchSource, CoreError, MerkleRoot};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

const ROOT_COLUMNS: &str = "root_id, batch_id, merkle_root, signature, event_count, \
     first_event_id, last_event_id, source, created_at";

fn row_to_root(row: &Row<'_>) -> rusqlite::Result<MerkleRoot> {
    let root_id: String = row.get(0)?;
    let batch_id: String = row.get(1)?;
    let merkle_root: Vec<u8> = row.get(2)?;
    let source: String = row.get(7)?;

    let mut root_bytes = [0u8; 32];
    if merkle_root.len() != 32 {
        return Err(rusqlite::Error::InvalidColumnType(
            2,
            "merkle_root".into(),
            rusqlite::types::Type::Blob,
        ));
    }
    root_bytes.copy_from_slice(&merkle_root);

    Ok(MerkleRoot {
        root_id: parse_uuid(&root_id)?,
        batch_id: parse_uuid(&batch_id)?,
        merkle_root: root_bytes,
        signature: row.get(3)?,
        event_count: row.get::<_, i64>(4)? as u32,
        first_event_id: row.get(5)?,
        last_event_id: row.get(6)?,
        source: BatchSource::from_str(&source)
            .map_err(|_| rusqlite::Error::InvalidColumnType(7, "source".into(), rusqlite::types::Type::Text))?,
        created_at: row.get(8)?,
    })
}

fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

impl Store {
    /// Insert a signed Merkle root and atomically bind every event in its
    /// `[first_event_id, last_event_id]` range to it, in one transaction
    /// (SPEC_FULL §9: root insertion and the `merkle_root_id` update are
    /// never allowed to observably diverge).
    pub fn commit_merkle_batch(&self, root: &MerkleRoot) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let txn = conn.transaction()?;
        txn.execute(
            "INSERT INTO merkle_roots (root_id, batch_id, merkle_root, signature, event_count, \
             first_event_id, last_event_id, source, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                root.root_id.to_string(),
                root.batch_id.to_string(),
                root.merkle_root.to_vec(),
                root.signature,
                root.event_count as i64,
                root.first_event_id,
                root.last_event_id,
                root.source.as_str(),
                root.created_at,
            ],
        )?;
        let updated = txn.execute(
            "UPDATE ledger_events SET merkle_root_id = ?1 \
             WHERE event_id >= ?2 AND event_id <= ?3 AND merkle_root_id IS NULL",
            params![root.root_id.to_string(), root.first_event_id, root.last_event_id],
        )?;
        if updated as u32 != root.event_count {
            return Err(RuntimeError::Core(CoreError::StateViolation(format!(
                "merkle batch {} expected to bind {} events but bound {}",
                root.batch_id, root.event_count, updated
            ))));
        }
        txn.commit()?;
        Ok(())
    }

    /// Load a Merkle root by id.
    pub fn get_merkle_root(&self, root_id: Uuid) -> Result<MerkleRoot> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {ROOT_COLUMNS} FROM merkle_roots WHERE root_id = ?1"),
            [root_id.to_string()],
            row_to_root,
        )
        .optional()?
        .ok_or_else(|| RuntimeError::Core(CoreError::NotFound(format!("merkle root {root_id}"))))
    }

    /// The Merkle root covering a given `event_id`, if that event has been batched.
    pub fn root_for_event(&self, event_id: i64) -> Result<Option<MerkleRoot>> {
        let conn = self.conn.lock().unwrap();
        let root = conn
            .query_row(
                &format!(
                    "SELECT {ROOT_COLUMNS} FROM merkle_roots \
                     WHERE first_event_id <= ?1 AND last_event_id >= ?1"
                ),
                [event_id],
                row_to_root,
            )
            .optional()?;
        Ok(root)
    }

    /// All roots ordered by creation, oldest first.
    pub fn list_merkle_roots(&self) -> Result<Vec<MerkleRoot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {ROOT_COLUMNS} FROM merkle_roots ORDER BY created_at ASC"))?;
        let rows = stmt.query_map([], row_to_root)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authority_types::{Decision, EventType, LedgerEvent};
    use chrono::Utc;
    use serde_json::Map;

    fn sample_event(principal_id: Uuid) -> LedgerEvent {
        LedgerEvent {
            event_id: 0,
            event_type: EventType::Issued,
            timestamp: Utc::now(),
            principal_id,
            mandate_id: None,
            decision: Some(Decision::Allowed),
            denial_reason: None,
            requested_action: None,
            requested_resource: None,
            event_metadata: Map::new(),
            correlation_id: None,
            merkle_root_id: None,
        }
    }

    fn sample_root(first: i64, last: i64, count: u32) -> MerkleRoot {
        MerkleRoot {
            root_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            merkle_root: [7u8; 32],
            signature: vec![1, 2, 3],
            event_count: count,
            first_event_id: first,
            last_event_id: last,
            source: BatchSource::Live,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn commit_batch_binds_events_in_range() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        let id1 = store.append_event(&sample_event(principal_id)).unwrap();
        let id2 = store.append_event(&sample_event(principal_id)).unwrap();

        let root = sample_root(id1, id2, 2);
        store.commit_merkle_batch(&root).unwrap();

        let bound = store.root_for_event(id1).unwrap().unwrap();
        assert_eq!(bound.root_id, root.root_id);
    }

    #[test]
    fn commit_batch_rejects_mismatched_event_count() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        let id1 = store.append_event(&sample_event(principal_id)).unwrap();

        let root = sample_root(id1, id1, 2);
        let err = store.commit_merkle_batch(&root).unwrap_err();
        assert_eq!(err.kind(), "STATE_VIOLATION");
    }

    #[test]
    fn root_for_event_is_none_when_unbatched() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        let id1 = store.append_event(&sample_event(principal_id)).unwrap();
        assert!(store.root_for_event(id1).unwrap().is_none());
    }
}
