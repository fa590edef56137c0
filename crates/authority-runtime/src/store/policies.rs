use super::Store;
use crate::error::{Result, RuntimeError};
use authority_types::{AuthorityPolicy, CoreError};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

fn row_to_policy(row: &Row<'_>) -> rusqlite::Result<AuthorityPolicy> {
    let policy_id: String = row.get(0)?;
    let principal_id: String = row.get(1)?;
    let patterns: String = row.get(3)?;
    let actions: String = row.get(4)?;
    let created_by: String = row.get(9)?;
    Ok(AuthorityPolicy {
        policy_id: parse_uuid(&policy_id)?,
        principal_id: parse_uuid(&principal_id)?,
        max_validity_seconds: row.get(2)?,
        allowed_resource_patterns: parse_json_strings(&patterns)?,
        allowed_actions: parse_json_strings(&actions)?,
        allow_delegation: row.get::<_, i64>(5)? != 0,
        max_delegation_depth: row.get::<_, i64>(6)? as u32,
        active: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
        created_by: parse_uuid(&created_by)?,
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

impl Store {
    /// Insert a brand-new policy. Does not deactivate any prior policy —
    /// see [`Store::replace_policy`] for the atomic replace operation.
    pub fn insert_policy(&self, policy: &AuthorityPolicy) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        insert_policy_stmt(&conn, policy)?;
        Ok(())
    }

    /// Atomically deactivate the current active policy for `principal_id` (if
    /// any) and insert `new_policy` in its place (§3.2 lifecycle; SPEC_FULL §10.5).
    pub fn replace_policy(&self, principal_id: Uuid, new_policy: &AuthorityPolicy) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let txn = conn.transaction()?;
        txn.execute(
            "UPDATE authority_policies SET active = 0 WHERE principal_id = ?1 AND active = 1",
            [principal_id.to_string()],
        )?;
        insert_policy_stmt(&txn, new_policy)?;
        txn.commit()?;
        Ok(())
    }

    /// The single active policy for a principal, if one exists.
    pub fn active_policy(&self, principal_id: Uuid) -> Result<Option<AuthorityPolicy>> {
        let conn = self.conn.lock().unwrap();
        let policy = conn
            .query_row(
                "SELECT policy_id, principal_id, max_validity_seconds, allowed_resource_patterns, \
                 allowed_actions, allow_delegation, max_delegation_depth, active, created_at, created_by \
                 FROM authority_policies WHERE principal_id = ?1 AND active = 1",
                [principal_id.to_string()],
                row_to_policy,
            )
            .optional()?;
        Ok(policy)
    }

    /// Load a policy by id regardless of active state.
    pub fn get_policy(&self, policy_id: Uuid) -> Result<AuthorityPolicy> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT policy_id, principal_id, max_validity_seconds, allowed_resource_patterns, \
             allowed_actions, allow_delegation, max_delegation_depth, active, created_at, created_by \
             FROM authority_policies WHERE policy_id = ?1",
            [policy_id.to_string()],
            row_to_policy,
        )
        .optional()?
        .ok_or_else(|| RuntimeError::Core(CoreError::NotFound(format!("policy {policy_id}"))))
    }
}

fn insert_policy_stmt(conn: &rusqlite::Connection, policy: &AuthorityPolicy) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO authority_policies (policy_id, principal_id, max_validity_seconds, \
         allowed_resource_patterns, allowed_actions, allow_delegation, max_delegation_depth, \
         active, created_at, created_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            policy.policy_id.to_string(),
            policy.principal_id.to_string(),
            policy.max_validity_seconds,
            serde_json::to_string(&policy.allowed_resource_patterns).unwrap(),
            serde_json::to_string(&policy.allowed_actions).unwrap(),
            policy.allow_delegation as i64,
            policy.max_delegation_depth as i64,
            policy.active as i64,
            policy.created_at,
            policy.created_by.to_string(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use authority_types::{Principal, PrincipalType};

    fn sample_policy(principal_id: Uuid, created_by: Uuid) -> AuthorityPolicy {
        AuthorityPolicy::new(
            principal_id,
            3600,
            vec!["api:openai:*".into()],
            vec!["api_call".into()],
            true,
            2,
            created_by,
        )
    }

    fn store_with_principal() -> (Store, Uuid) {
        let store = Store::memory().unwrap();
        let principal = Principal::new("agent-1", PrincipalType::Agent, "owner", "pem", None);
        store.insert_principal(&principal).unwrap();
        (store, principal.principal_id)
    }

    #[test]
    fn insert_then_active_policy_round_trips() {
        let (store, principal_id) = store_with_principal();
        let policy = sample_policy(principal_id, principal_id);
        store.insert_policy(&policy).unwrap();

        let active = store.active_policy(principal_id).unwrap().unwrap();
        assert_eq!(active.policy_id, policy.policy_id);
        assert_eq!(active.allowed_resource_patterns, vec!["api:openai:*".to_string()]);
    }

    #[test]
    fn replace_policy_deactivates_prior_active() {
        let (store, principal_id) = store_with_principal();
        let first = sample_policy(principal_id, principal_id);
        store.insert_policy(&first).unwrap();

        let second = sample_policy(principal_id, principal_id);
        store.replace_policy(principal_id, &second).unwrap();

        let active = store.active_policy(principal_id).unwrap().unwrap();
        assert_eq!(active.policy_id, second.policy_id);

        let old = store.get_policy(first.policy_id).unwrap();
        assert!(!old.active);
    }

    #[test]
    fn no_active_policy_returns_none() {
        let (store, principal_id) = store_with_principal();
        assert!(store.active_policy(principal_id).unwrap().is_none());
    }
}
