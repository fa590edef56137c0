use super::Store;
use crate::error::{Result, RuntimeError};
use authority_types::{CoreError, ExecutionMandate, LedgerEvent};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

fn row_to_mandate(row: &Row<'_>) -> rusqlite::Result<ExecutionMandate> {
    let mandate_id: String = row.get(0)?;
    let issuer_id: String = row.get(1)?;
    let subject_id: String = row.get(2)?;
    let resource_scope: String = row.get(5)?;
    let action_scope: String = row.get(6)?;
    let parent_mandate_id: Option<String> = row.get(9)?;

    Ok(ExecutionMandate {
        mandate_id: parse_uuid(&mandate_id)?,
        issuer_id: parse_uuid(&issuer_id)?,
        subject_id: parse_uuid(&subject_id)?,
        valid_from: row.get(3)?,
        valid_until: row.get(4)?,
        resource_scope: parse_json_strings(&resource_scope)?,
        action_scope: parse_json_strings(&action_scope)?,
        signature: row.get(7)?,
        created_at: row.get(8)?,
        parent_mandate_id: parent_mandate_id.map(|s| parse_uuid(&s)).transpose()?,
        delegation_depth: row.get::<_, i64>(10)? as u32,
        intent_hash: row.get(11)?,
        revoked: row.get::<_, i64>(12)? != 0,
        revoked_at: row.get(13)?,
        revocation_reason: row.get(14)?,
    })
}

fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_json_strings(s: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

const MANDATE_COLUMNS: &str = "mandate_id, issuer_id, subject_id, valid_from, valid_until, \
     resource_scope, action_scope, signature, created_at, parent_mandate_id, delegation_depth, \
     intent_hash, revoked, revoked_at, revocation_reason";

impl Store {
    /// Persist a newly-issued mandate. Mandates are immutable after issuance
    /// except for the one-way revocation transition.
    pub fn insert_mandate(&self, mandate: &ExecutionMandate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO execution_mandates (mandate_id, issuer_id, subject_id, valid_from, \
             valid_until, resource_scope, action_scope, signature, created_at, parent_mandate_id, \
             delegation_depth, intent_hash, revoked, revoked_at, revocation_reason) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                mandate.mandate_id.to_string(),
                mandate.issuer_id.to_string(),
                mandate.subject_id.to_string(),
                mandate.valid_from,
                mandate.valid_until,
                serde_json::to_string(&mandate.resource_scope).unwrap(),
                serde_json::to_string(&mandate.action_scope).unwrap(),
                mandate.signature,
                mandate.created_at,
                mandate.parent_mandate_id.map(|id| id.to_string()),
                mandate.delegation_depth as i64,
                mandate.intent_hash,
                mandate.revoked as i64,
                mandate.revoked_at,
                mandate.revocation_reason,
            ],
        )?;
        Ok(())
    }

    /// Persist a newly-issued mandate and its `issued` (or `denied`) ledger
    /// event atomically: a cancellation or crash between the two writes must
    /// never leave a mandate persisted without its event (§5).
    pub fn insert_mandate_with_event(&self, mandate: &ExecutionMandate, event: &LedgerEvent) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let txn = conn.transaction()?;
        txn.execute(
            "INSERT INTO execution_mandates (mandate_id, issuer_id, subject_id, valid_from, \
             valid_until, resource_scope, action_scope, signature, created_at, parent_mandate_id, \
             delegation_depth, intent_hash, revoked, revoked_at, revocation_reason) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                mandate.mandate_id.to_string(),
                mandate.issuer_id.to_string(),
                mandate.subject_id.to_string(),
                mandate.valid_from,
                mandate.valid_until,
                serde_json::to_string(&mandate.resource_scope).unwrap(),
                serde_json::to_string(&mandate.action_scope).unwrap(),
                mandate.signature,
                mandate.created_at,
                mandate.parent_mandate_id.map(|id| id.to_string()),
                mandate.delegation_depth as i64,
                mandate.intent_hash,
                mandate.revoked as i64,
                mandate.revoked_at,
                mandate.revocation_reason,
            ],
        )?;
        txn.execute(
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
        let event_id = txn.last_insert_rowid();
        txn.commit()?;
        Ok(event_id)
    }

    /// Load a mandate by id.
    pub fn get_mandate(&self, mandate_id: Uuid) -> Result<ExecutionMandate> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {MANDATE_COLUMNS} FROM execution_mandates WHERE mandate_id = ?1"),
            [mandate_id.to_string()],
            row_to_mandate,
        )
        .optional()?
        .ok_or_else(|| RuntimeError::Core(CoreError::NotFound(format!("mandate {mandate_id}"))))
    }

    /// Direct, non-revoked children of a mandate (one hop of the delegation tree).
    pub fn active_children(&self, mandate_id: Uuid) -> Result<Vec<ExecutionMandate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MANDATE_COLUMNS} FROM execution_mandates \
             WHERE parent_mandate_id = ?1 AND revoked = 0"
        ))?;
        let rows = stmt
            .query_map([mandate_id.to_string()], row_to_mandate)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Mark a mandate revoked. No-op on an already-revoked mandate (the
    /// transition is idempotent at the storage layer; the engine decides
    /// whether a second revoke attempt is itself an error).
    pub fn revoke_mandate(&self, mandate_id: Uuid, reason: Option<&str>, revoked_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE execution_mandates SET revoked = 1, revoked_at = ?2, revocation_reason = ?3 \
             WHERE mandate_id = ?1",
            params![mandate_id.to_string(), revoked_at, reason],
        )?;
        Ok(())
    }
}
