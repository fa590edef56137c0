use super::Store;
use crate::error::Result;
use authority_types::{Decision, EventType, LedgerEvent};
use rusqlite::{params, Row};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

const EVENT_COLUMNS: &str = "event_id, event_type, timestamp, principal_id, mandate_id, decision, \
     denial_reason, requested_action, requested_resource, event_metadata, correlation_id, merkle_root_id";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<LedgerEvent> {
    let event_type: String = row.get(1)?;
    let principal_id: String = row.get(3)?;
    let mandate_id: Option<String> = row.get(4)?;
    let decision: Option<String> = row.get(5)?;
    let metadata: String = row.get(9)?;
    let correlation_id: Option<String> = row.get(10)?;
    let merkle_root_id: Option<String> = row.get(11)?;

    Ok(LedgerEvent {
        event_id: row.get(0)?,
        event_type: EventType::from_str(&event_type)
            .map_err(|_| rusqlite::Error::InvalidColumnType(1, "event_type".into(), rusqlite::types::Type::Text))?,
        timestamp: row.get(2)?,
        principal_id: parse_uuid(&principal_id)?,
        mandate_id: mandate_id.map(|s| parse_uuid(&s)).transpose()?,
        decision: decision
            .map(|s| Decision::from_str(&s))
            .transpose()
            .map_err(|_| rusqlite::Error::InvalidColumnType(5, "decision".into(), rusqlite::types::Type::Text))?,
        denial_reason: row.get(6)?,
        requested_action: row.get(7)?,
        requested_resource: row.get(8)?,
        event_metadata: parse_json_object(&metadata)?,
        correlation_id: correlation_id.map(|s| parse_uuid(&s)).transpose()?,
        merkle_root_id: merkle_root_id.map(|s| parse_uuid(&s)).transpose()?,
    })
}

fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_json_object(s: &str) -> rusqlite::Result<Map<String, Value>> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

/// Filter for range-scan ledger queries (SPEC_FULL §10.5 `query_events`).
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub principal_id: Option<Uuid>,
    pub event_type: Option<EventType>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub until: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<u32>,
}

impl Store {
    /// Append an event, returning its assigned monotonic `event_id`.
    ///
    /// `event.event_id` and `event.merkle_root_id` on the input are ignored;
    /// both are assigned by storage.
    pub fn append_event(&self, event: &LedgerEvent) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ledger_events (event_type, timestamp, principal_id, mandate_id, decision, \
             denial_reason, requested_action, requested_resource, event_metadata, correlation_id, \
             merkle_root_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL)",
            params![
                event.event_type.as_str(),
                event.timestamp,
                event.principal_id.to_string(),
                event.mandate_id.map(|id| id.to_string()),
                event.decision.map(|d| d.as_str()),
                event.denial_reason,
                event.requested_action,
                event.requested_resource,
                serde_json::to_string(&event.event_metadata).unwrap(),
                event.correlation_id.map(|id| id.to_string()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Events matching `filter`, ordered by `event_id` ascending.
    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>> {
        let conn = self.conn.lock().unwrap();
        let principal = filter.principal_id.map(|id| id.to_string());
        let event_type = filter.event_type.map(|et| et.as_str());

        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM ledger_events WHERE 1 = 1");
        let mut bind: Vec<&dyn rusqlite::ToSql> = Vec::new();
        if let Some(principal) = &principal {
            sql.push_str(" AND principal_id = ?");
            bind.push(principal);
        }
        if let Some(event_type) = &event_type {
            sql.push_str(" AND event_type = ?");
            bind.push(event_type);
        }
        if let Some(since) = &filter.since {
            sql.push_str(" AND timestamp >= ?");
            bind.push(since);
        }
        if let Some(until) = &filter.until {
            sql.push_str(" AND timestamp <= ?");
            bind.push(until);
        }
        sql.push_str(" ORDER BY event_id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(bind.as_slice(), row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every event for one principal, ascending by `event_id`.
    pub fn events_for_principal(&self, principal_id: Uuid) -> Result<Vec<LedgerEvent>> {
        self.query_events(&EventFilter {
            principal_id: Some(principal_id),
            ..Default::default()
        })
    }

    /// Every event of one type, ascending by `event_id`.
    pub fn events_by_type(&self, event_type: EventType) -> Result<Vec<LedgerEvent>> {
        self.query_events(&EventFilter {
            event_type: Some(event_type),
            ..Default::default()
        })
    }

    /// Every event with `event_id` in `[first_event_id, last_event_id]`, the
    /// range a committed Merkle batch covers.
    pub fn events_in_batch_range(&self, first_event_id: i64, last_event_id: i64) -> Result<Vec<LedgerEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM ledger_events \
             WHERE event_id >= ?1 AND event_id <= ?2 ORDER BY event_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![first_event_id, last_event_id], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Contiguous, unbatched events with `event_id` in `(after_event_id, ..]`,
    /// ordered ascending. Used by the Merkle batcher to form the next batch.
    pub fn unbatched_events(&self, after_event_id: i64, limit: u32) -> Result<Vec<LedgerEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM ledger_events \
             WHERE event_id > ?1 AND merkle_root_id IS NULL \
             ORDER BY event_id ASC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![after_event_id, limit], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The highest `event_id` currently bound to any Merkle root, or 0 if none.
    pub fn last_batched_event_id(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(last_event_id) FROM merkle_roots",
            [],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_event(principal_id: Uuid, event_type: EventType) -> LedgerEvent {
        LedgerEvent {
            event_id: 0,
            event_type,
            timestamp: Utc::now(),
            principal_id,
            mandate_id: None,
            decision: None,
            denial_reason: None,
            requested_action: Some("api_call".into()),
            requested_resource: Some("api:openai:gpt-4".into()),
            event_metadata: Map::new(),
            correlation_id: None,
            merkle_root_id: None,
        }
    }

    #[test]
    fn append_assigns_monotonic_ids() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        let first = store.append_event(&sample_event(principal_id, EventType::Issued)).unwrap();
        let second = store.append_event(&sample_event(principal_id, EventType::Validated)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn query_events_filters_by_principal() {
        let store = Store::memory().unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append_event(&sample_event(a, EventType::Issued)).unwrap();
        store.append_event(&sample_event(b, EventType::Issued)).unwrap();

        let results = store
            .query_events(&EventFilter {
                principal_id: Some(a),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].principal_id, a);
    }

    #[test]
    fn query_events_filters_by_type() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        store.append_event(&sample_event(principal_id, EventType::Issued)).unwrap();
        store.append_event(&sample_event(principal_id, EventType::Denied)).unwrap();

        let results = store
            .query_events(&EventFilter {
                event_type: Some(EventType::Denied),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_type, EventType::Denied);
    }

    #[test]
    fn unbatched_events_excludes_batched() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        store.append_event(&sample_event(principal_id, EventType::Issued)).unwrap();
        let unbatched = store.unbatched_events(0, 10).unwrap();
        assert_eq!(unbatched.len(), 1);
    }

    #[test]
    fn last_batched_event_id_defaults_to_zero() {
        let store = Store::memory().unwrap();
        assert_eq!(store.last_batched_event_id().unwrap(), 0);
    }

    #[test]
    fn events_for_principal_and_by_type_match_query_events() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        store.append_event(&sample_event(principal_id, EventType::Issued)).unwrap();
        store.append_event(&sample_event(principal_id, EventType::Validated)).unwrap();

        assert_eq!(store.events_for_principal(principal_id).unwrap().len(), 2);
        assert_eq!(store.events_by_type(EventType::Validated).unwrap().len(), 1);
    }

    #[test]
    fn events_in_batch_range_is_inclusive() {
        let store = Store::memory().unwrap();
        let principal_id = Uuid::new_v4();
        let first = store.append_event(&sample_event(principal_id, EventType::Issued)).unwrap();
        let second = store.append_event(&sample_event(principal_id, EventType::Validated)).unwrap();
        store.append_event(&sample_event(principal_id, EventType::Validated)).unwrap();

        let ranged = store.events_in_batch_range(first, second).unwrap();
        assert_eq!(ranged.len(), 2);
    }
}
