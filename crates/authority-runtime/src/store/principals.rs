use super::Store;
use crate::error::{Result, RuntimeError};
use authority_types::{CoreError, Principal, PrincipalType};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

fn row_to_principal(row: &Row<'_>) -> rusqlite::Result<Principal> {
    let principal_id: String = row.get(0)?;
    let principal_type: String = row.get(2)?;
    Ok(Principal {
        principal_id: Uuid::parse_str(&principal_id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(1)?,
        principal_type: PrincipalType::from_str(&principal_type).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                2,
                "principal_type".into(),
                rusqlite::types::Type::Text,
            )
        })?,
        owner: row.get(3)?,
        public_key_pem: row.get(4)?,
        private_key_pem: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Store {
    /// Insert a new principal. Errors if the id already exists.
    pub fn insert_principal(&self, principal: &Principal) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO principals (principal_id, name, principal_type, owner, \
             public_key_pem, private_key_pem, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                principal.principal_id.to_string(),
                principal.name,
                principal.principal_type.as_str(),
                principal.owner,
                principal.public_key_pem,
                principal.private_key_pem,
                principal.created_at,
            ],
        )?;
        Ok(())
    }

    /// Load a principal by id.
    pub fn get_principal(&self, principal_id: Uuid) -> Result<Principal> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT principal_id, name, principal_type, owner, public_key_pem, \
             private_key_pem, created_at FROM principals WHERE principal_id = ?1",
            [principal_id.to_string()],
            row_to_principal,
        )
        .optional()?
        .ok_or_else(|| RuntimeError::Core(CoreError::NotFound(format!("principal {principal_id}"))))
    }

    /// True if a principal with this id exists.
    pub fn principal_exists(&self, principal_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM principals WHERE principal_id = ?1",
            [principal_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
