//! Database connection and transaction management for the registry.
//!
//! A `Session` wraps one rusqlite connection, opened once per invocation
//! and passed explicitly into every component call. Write paths run inside
//! `Session::transaction`, which commits on success and rolls back on any
//! error, so half-written rows are never observable.

use crate::core::error::DocPulseError;
use crate::core::schemas;
use crate::core::store::Store;
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::Path;

pub fn db_connect(db_path: &str) -> Result<Connection, DocPulseError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(DocPulseError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(DocPulseError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(DocPulseError::RusqliteError)?;
    Ok(conn)
}

pub fn initialize_context_db(store: &Store) -> Result<(), DocPulseError> {
    let db_path = store.db_path();
    fs::create_dir_all(store.data_dir()).map_err(DocPulseError::IoError)?;

    let conn = db_connect(&db_path.to_string_lossy())?;
    apply_schema(&conn)?;
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<(), DocPulseError> {
    conn.execute(schemas::SCHEMA_SYSTEMS, [])?;
    conn.execute(schemas::SCHEMA_SYSTEM_DEPENDENCIES, [])?;
    conn.execute(schemas::SCHEMA_ADRS, [])?;
    conn.execute(schemas::SCHEMA_ADR_SYSTEMS, [])?;
    conn.execute(schemas::SCHEMA_ADR_TAGS, [])?;
    conn.execute(schemas::INDEX_DEPENDENCIES_REVERSE, [])?;
    conn.execute(schemas::INDEX_ADR_SYSTEMS_PATH, [])?;
    conn.execute(schemas::INDEX_ADRS_STATUS, [])?;
    Ok(())
}

/// One open registry connection, scoped to a single invocation.
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Open the registry, initializing the schema if the database is new.
    pub fn open(store: &Store) -> Result<Self, DocPulseError> {
        let db_path = store.db_path();
        if !db_path.exists() {
            initialize_context_db(store)?;
        }
        let conn = db_connect(&db_path.to_string_lossy())?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an existing registry without creating it.
    ///
    /// A missing or unreadable database is an infrastructure failure,
    /// reported distinctly from validation findings.
    pub fn open_existing(store: &Store) -> Result<Self, DocPulseError> {
        let db_path = store.db_path();
        if !db_path.exists() {
            return Err(DocPulseError::Infrastructure(format!(
                "registry not found at {} (run `docpulse init` first)",
                db_path.display()
            )));
        }
        let conn = db_connect(&db_path.to_string_lossy())
            .map_err(|e| DocPulseError::Infrastructure(format!("cannot open registry: {}", e)))?;
        Ok(Self { conn })
    }

    /// In-memory session for tests and ephemeral analysis.
    pub fn open_in_memory() -> Result<Self, DocPulseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys=ON;", [])?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction: commit on Ok, roll back on Err.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, DocPulseError>
    where
        F: FnOnce(&Transaction) -> Result<T, DocPulseError>,
    {
        let tx = self.conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}
