//! Systems and dependency-edge CRUD over the registry.
//!
//! Every function takes an explicit session; writes run inside
//! transactions. Registering a system creates both the row and the
//! on-disk bundle atomically: a scaffold failure rolls the row back, a
//! row failure leaves no files behind.

use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::scaffold;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemRecord {
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub system_path: String,
    pub depends_on: String,
}

fn validate_path(path: &str, field: &str) -> Result<(), DocPulseError> {
    if path.trim().is_empty() {
        return Err(DocPulseError::ValidationError(format!("{} cannot be empty", field)));
    }
    if path.len() > 512 {
        return Err(DocPulseError::ValidationError(format!(
            "{} exceeds maximum length (512)",
            field
        )));
    }
    if path.contains("..") {
        return Err(DocPulseError::ValidationError(format!(
            "Path traversal not allowed in {}",
            field
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), DocPulseError> {
    if name.trim().is_empty() {
        return Err(DocPulseError::ValidationError("name cannot be empty".into()));
    }
    if name.len() > 256 {
        return Err(DocPulseError::ValidationError(
            "name exceeds maximum length (256)".into(),
        ));
    }
    Ok(())
}

fn row_to_system(row: &rusqlite::Row<'_>) -> rusqlite::Result<SystemRecord> {
    Ok(SystemRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

const SYSTEM_COLS: &str = "path, name, description, created_at, updated_at";

/// Register a system: registry row plus documentation bundle, atomically.
pub fn create_system(
    session: &mut Session,
    store: &Store,
    path: &str,
    name: &str,
    description: Option<&str>,
) -> Result<SystemRecord, DocPulseError> {
    validate_path(path, "path")?;
    validate_name(name)?;

    let now = time::now_rfc3339();
    let bundle_dir = store.bundle_dir(path);

    // Scaffold first, then commit the row; any registry failure unwinds
    // the files so a bundle without a row is never left visible.
    let outcome = scaffold::create_bundle(&bundle_dir, name)?;
    let inserted = session.transaction(|tx| {
        tx.execute(
            "INSERT INTO systems (path, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, name, description, now, now],
        )?;
        Ok(())
    });
    if let Err(e) = inserted {
        outcome.rollback();
        return Err(e);
    }

    get_system(session, path)?.ok_or_else(|| {
        DocPulseError::Infrastructure(format!("system '{}' vanished after insert", path))
    })
}

pub fn get_system(session: &Session, path: &str) -> Result<Option<SystemRecord>, DocPulseError> {
    let record = session
        .conn()
        .query_row(
            &format!("SELECT {} FROM systems WHERE path = ?1", SYSTEM_COLS),
            params![path],
            row_to_system,
        )
        .optional()?;
    Ok(record)
}

pub fn list_systems(session: &Session) -> Result<Vec<SystemRecord>, DocPulseError> {
    let mut stmt = session
        .conn()
        .prepare(&format!("SELECT {} FROM systems ORDER BY path", SYSTEM_COLS))?;
    let rows = stmt.query_map([], row_to_system)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}

pub fn update_system(
    session: &mut Session,
    path: &str,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<bool, DocPulseError> {
    if name.is_none() && description.is_none() {
        return Ok(false);
    }
    if let Some(n) = name {
        validate_name(n)?;
    }

    let now = time::now_rfc3339();
    let updated = session.transaction(|tx| {
        let mut set_clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(n) = name {
            set_clauses.push("name = ?");
            values.push(Box::new(n.to_string()));
        }
        if let Some(d) = description {
            set_clauses.push("description = ?");
            values.push(Box::new(d.to_string()));
        }
        set_clauses.push("updated_at = ?");
        values.push(Box::new(now.clone()));
        values.push(Box::new(path.to_string()));

        let sql = format!(
            "UPDATE systems SET {} WHERE path = ?",
            set_clauses.join(", ")
        );
        let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let count = tx.execute(&sql, refs.as_slice())?;
        Ok(count > 0)
    })?;

    Ok(updated)
}

/// Delete a system, cascading its dependency edges and ADR links.
pub fn delete_system(session: &mut Session, path: &str) -> Result<bool, DocPulseError> {
    session.transaction(|tx| {
        tx.execute(
            "DELETE FROM system_dependencies WHERE system_path = ?1 OR depends_on = ?1",
            params![path],
        )?;
        tx.execute("DELETE FROM adr_systems WHERE system_path = ?1", params![path])?;
        let count = tx.execute("DELETE FROM systems WHERE path = ?1", params![path])?;
        Ok(count > 0)
    })
}

/// Add a dependency edge. Both endpoints must be registered; self-loops
/// are rejected. Both endpoints' `updated_at` move so the registry
/// watermark reflects edge changes.
pub fn add_dependency(
    session: &mut Session,
    system_path: &str,
    depends_on: &str,
) -> Result<(), DocPulseError> {
    validate_path(system_path, "system_path")?;
    validate_path(depends_on, "depends_on")?;
    if system_path == depends_on {
        return Err(DocPulseError::ValidationError(format!(
            "system '{}' cannot depend on itself",
            system_path
        )));
    }

    let now = time::now_rfc3339();
    session.transaction(|tx| {
        for endpoint in [system_path, depends_on] {
            let known: bool = tx
                .query_row(
                    "SELECT COUNT(*) FROM systems WHERE path = ?1",
                    params![endpoint],
                    |row| row.get::<_, i64>(0),
                )
                .map(|c| c > 0)?;
            if !known {
                return Err(DocPulseError::NotFound(format!(
                    "system '{}' is not registered",
                    endpoint
                )));
            }
        }

        tx.execute(
            "INSERT INTO system_dependencies (system_path, depends_on) VALUES (?1, ?2)",
            params![system_path, depends_on],
        )?;
        tx.execute(
            "UPDATE systems SET updated_at = ?1 WHERE path IN (?2, ?3)",
            params![now, system_path, depends_on],
        )?;
        Ok(())
    })
}

pub fn remove_dependency(
    session: &mut Session,
    system_path: &str,
    depends_on: &str,
) -> Result<bool, DocPulseError> {
    let now = time::now_rfc3339();
    session.transaction(|tx| {
        let count = tx.execute(
            "DELETE FROM system_dependencies WHERE system_path = ?1 AND depends_on = ?2",
            params![system_path, depends_on],
        )?;
        if count > 0 {
            tx.execute(
                "UPDATE systems SET updated_at = ?1 WHERE path IN (?2, ?3)",
                params![now, system_path, depends_on],
            )?;
        }
        Ok(count > 0)
    })
}

pub fn list_dependencies(session: &Session) -> Result<Vec<DependencyEdge>, DocPulseError> {
    let mut stmt = session.conn().prepare(
        "SELECT system_path, depends_on FROM system_dependencies
         ORDER BY system_path, depends_on",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DependencyEdge {
            system_path: row.get(0)?,
            depends_on: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}

/// Systems `system_path` directly depends on.
pub fn get_dependencies(
    session: &Session,
    system_path: &str,
) -> Result<Vec<SystemRecord>, DocPulseError> {
    let mut stmt = session.conn().prepare(&format!(
        "SELECT s.{} FROM systems s
         JOIN system_dependencies sd ON s.path = sd.depends_on
         WHERE sd.system_path = ?1
         ORDER BY s.path",
        SYSTEM_COLS.replace(", ", ", s.")
    ))?;
    let rows = stmt.query_map(params![system_path], row_to_system)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}

/// Systems that directly depend on `system_path`.
pub fn get_dependents(
    session: &Session,
    system_path: &str,
) -> Result<Vec<SystemRecord>, DocPulseError> {
    let mut stmt = session.conn().prepare(&format!(
        "SELECT s.{} FROM systems s
         JOIN system_dependencies sd ON s.path = sd.system_path
         WHERE sd.depends_on = ?1
         ORDER BY s.path",
        SYSTEM_COLS.replace(", ", ", s.")
    ))?;
    let rows = stmt.query_map(params![system_path], row_to_system)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}

/// Max `updated_at` across the registry: the store's update watermark.
pub fn update_watermark(session: &Session) -> Result<Option<String>, DocPulseError> {
    let watermark: Option<String> = session.conn().query_row(
        "SELECT MAX(updated_at) FROM (
             SELECT updated_at FROM systems
             UNION ALL
             SELECT updated_at FROM adrs
         )",
        [],
        |row| row.get(0),
    )?;
    Ok(watermark)
}
