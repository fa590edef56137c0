//! `Store`: SQLite-backed persistence facade for the authority core (§6.2).
//!
//! The facade stays thin; per-entity implementation lives in sibling modules
//! mirroring the table they own.

mod ledger;
mod mandates;
mod merkle;
mod policies;
mod principals;
mod schema;
mod snapshots;

pub use ledger::EventFilter;

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed persistence for principals, policies, mandates, the ledger,
/// Merkle roots, and recovery snapshots.
///
/// Cloning a `Store` shares the same underlying connection.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open a file-backed store, creating the schema if absent.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store. Intended for tests and ephemeral runs.
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Wrap an already-open connection (for tests sharing a connection across
    /// handles, or callers with their own connection pool).
    pub fn from_connection(conn: Connection) -> Result<Self> {
        schema::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}
