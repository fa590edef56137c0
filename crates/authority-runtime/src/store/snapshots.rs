use super::Store;
use crate::error::{Result, RuntimeError};
use authority_types::{CoreError, LedgerSnapshot};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<LedgerSnapshot> {
    let snapshot_id: String = row.get(0)?;
    let merkle_root: Vec<u8> = row.get(3)?;
    let data: String = row.get(4)?;

    let mut root_bytes = [0u8; 32];
    if merkle_root.len() != 32 {
        return Err(rusqlite::Error::InvalidColumnType(
            3,
            "merkle_root".into(),
            rusqlite::types::Type::Blob,
        ));
    }
    root_bytes.copy_from_slice(&merkle_root);

    Ok(LedgerSnapshot {
        snapshot_id: Uuid::parse_str(&snapshot_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        snapshot_timestamp: row.get(1)?,
        total_events: row.get(2)?,
        merkle_root: root_bytes,
        snapshot_data: serde_json::from_str(&data)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        created_at: row.get(5)?,
    })
}

const SNAPSHOT_COLUMNS: &str =
    "snapshot_id, snapshot_timestamp, total_events, merkle_root, snapshot_data, created_at";

impl Store {
    /// Persist a recovery checkpoint.
    pub fn insert_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ledger_snapshots (snapshot_id, snapshot_timestamp, total_events, \
             merkle_root, snapshot_data, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.snapshot_id.to_string(),
                snapshot.snapshot_timestamp,
                snapshot.total_events,
                snapshot.merkle_root.to_vec(),
                serde_json::to_string(&snapshot.snapshot_data).unwrap(),
                snapshot.created_at,
            ],
        )?;
        Ok(())
    }

    /// The most recently created snapshot, if any.
    pub fn latest_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let snapshot = conn
            .query_row(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM ledger_snapshots ORDER BY created_at DESC LIMIT 1"),
                [],
                row_to_snapshot,
            )
            .optional()?;
        Ok(snapshot)
    }

    /// Load a snapshot by id.
    pub fn get_snapshot(&self, snapshot_id: Uuid) -> Result<LedgerSnapshot> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM ledger_snapshots WHERE snapshot_id = ?1"),
            [snapshot_id.to_string()],
            row_to_snapshot,
        )
        .optional()?
        .ok_or_else(|| RuntimeError::Core(CoreError::NotFound(format!("snapshot {snapshot_id}"))))
    }

    /// Delete snapshots older than `retention_days`. Never touches
    /// `ledger_events` or `merkle_roots` (SPEC_FULL §10.5): snapshots are a
    /// recovery convenience, not the ledger's source of truth.
    pub fn cleanup_snapshots(&self, retention_days: i64, now: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let cutoff = now - chrono::Duration::days(retention_days);
        let deleted = conn.execute(
            "DELETE FROM ledger_snapshots WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted as u64)
    }
}
