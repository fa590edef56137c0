//! SQLite schema for the authority core's persistence contract (§6.2).
//!
//! Tables:
//! - `principals`, `authority_policies`: identity and delegation caps.
//! - `execution_mandates`: signed, time-bounded grants (immutable once issued,
//!   except for the one-way `revoked*` transition).
//! - `ledger_events`: append-only, monotonic `event_id`.
//! - `merkle_roots`: signed batch commitments over contiguous event ranges.
//! - `ledger_snapshots`: recovery checkpoints.
//!
//! Schema version: 1

use rusqlite::Connection;

/// DDL for the authority core's persistence contract.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS principals (
    principal_id     TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    principal_type   TEXT NOT NULL,
    owner            TEXT NOT NULL,
    public_key_pem   TEXT NOT NULL,
    private_key_pem  TEXT,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS authority_policies (
    policy_id                  TEXT PRIMARY KEY,
    principal_id               TEXT NOT NULL REFERENCES principals(principal_id),
    max_validity_seconds       INTEGER NOT NULL,
    allowed_resource_patterns  TEXT NOT NULL,
    allowed_actions            TEXT NOT NULL,
    allow_delegation           INTEGER NOT NULL,
    max_delegation_depth       INTEGER NOT NULL,
    active                     INTEGER NOT NULL,
    created_at                 TEXT NOT NULL,
    created_by                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_policies_principal_active
    ON authority_policies(principal_id, active);

CREATE TABLE IF NOT EXISTS execution_mandates (
    mandate_id          TEXT PRIMARY KEY,
    issuer_id           TEXT NOT NULL REFERENCES principals(principal_id),
    subject_id          TEXT NOT NULL REFERENCES principals(principal_id),
    valid_from          TEXT NOT NULL,
    valid_until         TEXT NOT NULL,
    resource_scope      TEXT NOT NULL,
    action_scope        TEXT NOT NULL,
    signature           BLOB NOT NULL,
    created_at          TEXT NOT NULL,
    parent_mandate_id   TEXT REFERENCES execution_mandates(mandate_id),
    delegation_depth    INTEGER NOT NULL,
    intent_hash         TEXT,
    revoked             INTEGER NOT NULL DEFAULT 0,
    revoked_at          TEXT,
    revocation_reason   TEXT
);

CREATE INDEX IF NOT EXISTS idx_mandates_parent
    ON execution_mandates(parent_mandate_id);
CREATE INDEX IF NOT EXISTS idx_mandates_issuer
    ON execution_mandates(issuer_id);

CREATE TABLE IF NOT EXISTS ledger_events (
    event_id             INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type           TEXT NOT NULL,
    timestamp            TEXT NOT NULL,
    principal_id         TEXT NOT NULL,
    mandate_id           TEXT,
    decision             TEXT,
    denial_reason        TEXT,
    requested_action     TEXT,
    requested_resource   TEXT,
    event_metadata       TEXT NOT NULL DEFAULT '{}',
    correlation_id       TEXT,
    merkle_root_id       TEXT REFERENCES merkle_roots(root_id)
);

CREATE INDEX IF NOT EXISTS idx_events_principal_timestamp
    ON ledger_events(principal_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_events_type_timestamp
    ON ledger_events(event_type, timestamp);

CREATE TABLE IF NOT EXISTS merkle_roots (
    root_id          TEXT PRIMARY KEY,
    batch_id         TEXT NOT NULL UNIQUE,
    merkle_root      BLOB NOT NULL,
    signature        BLOB NOT NULL,
    event_count      INTEGER NOT NULL,
    first_event_id   INTEGER NOT NULL,
    last_event_id    INTEGER NOT NULL,
    source           TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_roots_event_range
    ON merkle_roots(first_event_id, last_event_id);
CREATE INDEX IF NOT EXISTS idx_roots_created_at
    ON merkle_roots(created_at);

CREATE TABLE IF NOT EXISTS ledger_snapshots (
    snapshot_id         TEXT PRIMARY KEY,
    snapshot_timestamp  TEXT NOT NULL,
    total_events        INTEGER NOT NULL,
    merkle_root         BLOB NOT NULL,
    snapshot_data       TEXT NOT NULL DEFAULT '{}',
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_created_at
    ON ledger_snapshots(created_at);
"#;

/// Apply connection-level pragmas and the schema DDL. Idempotent.
pub fn init_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");
    let _ = conn.busy_timeout(std::time::Duration::from_millis(5000));
    conn.execute_batch(SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        init_connection(&conn).unwrap();
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_connection(&conn).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        init_connection(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO authority_policies (policy_id, principal_id, max_validity_seconds, \
             allowed_resource_patterns, allowed_actions, allow_delegation, max_delegation_depth, \
             active, created_at, created_by) VALUES ('p1','missing',3600,'[]','[]',0,0,1,'now','c')",
            [],
        );
        assert!(result.is_err());
    }
}
