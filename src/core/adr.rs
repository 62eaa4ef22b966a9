//! ADR CRUD, system links, tags, and supersession wiring.
//!
//! ADRs live twice: a registry row and a markdown file under some
//! bundle's `adr/` directory. Creation writes both atomically.
//! Supersession is stored as weak id references (`supersedes` /
//! `superseded_by`) kept symmetric by `supersede`; the validator checks
//! symmetry and acyclicity for rows edited out-of-band.

use crate::core::assets;
use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;

pub const STATUS_PROPOSED: &str = "proposed";
pub const STATUS_ACCEPTED: &str = "accepted";
pub const STATUS_DEPRECATED: &str = "deprecated";
pub const STATUS_SUPERSEDED: &str = "superseded";

pub const VALID_STATUSES: [&str; 4] = [
    STATUS_PROPOSED,
    STATUS_ACCEPTED,
    STATUS_DEPRECATED,
    STATUS_SUPERSEDED,
];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdrRecord {
    pub id: String,
    pub title: String,
    pub status: String,
    pub file_path: String,
    pub context: Option<String>,
    pub decision: Option<String>,
    pub consequences: Option<String>,
    pub supersedes: Option<String>,
    pub superseded_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdrLink {
    pub adr_id: String,
    pub system_path: String,
}

fn validate_status(status: &str) -> Result<(), DocPulseError> {
    if VALID_STATUSES.contains(&status) {
        return Ok(());
    }
    Err(DocPulseError::ValidationError(format!(
        "invalid ADR status '{}'. Valid: {}",
        status,
        VALID_STATUSES.join(", ")
    )))
}

fn validate_id(id: &str) -> Result<(), DocPulseError> {
    if id.trim().is_empty() {
        return Err(DocPulseError::ValidationError("id cannot be empty".into()));
    }
    if id.len() > 128 {
        return Err(DocPulseError::ValidationError(
            "id exceeds maximum length (128)".into(),
        ));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), DocPulseError> {
    if title.trim().is_empty() {
        return Err(DocPulseError::ValidationError("title cannot be empty".into()));
    }
    if title.len() > 512 {
        return Err(DocPulseError::ValidationError(
            "title exceeds maximum length (512)".into(),
        ));
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), DocPulseError> {
    if tag.trim().is_empty() {
        return Err(DocPulseError::ValidationError("tag cannot be empty".into()));
    }
    if tag.len() > 64 {
        return Err(DocPulseError::ValidationError(
            "tag exceeds maximum length (64)".into(),
        ));
    }
    Ok(())
}

const ADR_COLS: &str = "id, title, status, file_path, context, decision, consequences, supersedes, superseded_by, created_at, updated_at";

fn row_to_adr(row: &rusqlite::Row<'_>) -> rusqlite::Result<AdrRecord> {
    Ok(AdrRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        file_path: row.get(3)?,
        context: row.get(4)?,
        decision: row.get(5)?,
        consequences: row.get(6)?,
        supersedes: row.get(7)?,
        superseded_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Next free identifier in the `ADR-NNN` sequence.
pub fn next_adr_id(session: &Session) -> Result<String, DocPulseError> {
    let mut stmt = session.conn().prepare("SELECT id FROM adrs")?;
    let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut max_seen = 0u32;
    for id in ids {
        let id = id?;
        if let Some(numeric) = id.strip_prefix("ADR-") {
            if let Ok(n) = numeric.parse::<u32>() {
                max_seen = max_seen.max(n);
            }
        }
    }
    Ok(format!("ADR-{:03}", max_seen + 1))
}

/// Slug used in ADR filenames: lowercase, alphanumeric runs joined by '-'.
fn title_slug(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub struct NewAdr<'a> {
    pub title: &'a str,
    pub status: &'a str,
    /// Systems to link; the first one's bundle hosts the ADR file.
    /// Empty is valid: a global decision under the root `.pulse/adr/`.
    pub links: Vec<&'a str>,
    pub tags: Vec<&'a str>,
    pub context: Option<&'a str>,
    pub decision: Option<&'a str>,
    pub consequences: Option<&'a str>,
}

/// Create an ADR: registry row, links, tags, and rendered file, atomically.
///
/// The file lands in the first linked system's bundle, or in the root
/// `.pulse/adr/` for a global decision (zero links).
pub fn create_adr(
    session: &mut Session,
    store: &Store,
    new: NewAdr<'_>,
) -> Result<AdrRecord, DocPulseError> {
    validate_title(new.title)?;
    validate_status(new.status)?;

    let id = next_adr_id(session)?;
    let now = time::now_rfc3339();

    let adr_dir_rel = match new.links.first() {
        Some(system_path) => format!("{}/.pulse/adr", system_path),
        None => ".pulse/adr".to_string(),
    };
    let file_rel = format!("{}/{}-{}.md", adr_dir_rel, id, title_slug(new.title));
    let file_abs = store.root.join(&file_rel);

    let date = now.split('T').next().unwrap_or(&now).to_string();
    let content = assets::render_template(
        assets::TEMPLATE_ADR,
        &[
            ("ADR ID", id.as_str()),
            ("Title", new.title),
            ("Status", new.status),
            ("Date", date.as_str()),
            ("Context", new.context.unwrap_or("...")),
            ("Decision", new.decision.unwrap_or("...")),
            ("Consequences", new.consequences.unwrap_or("...")),
        ],
    );

    if file_abs.exists() {
        return Err(DocPulseError::ValidationError(format!(
            "refusing to overwrite existing ADR file: {}",
            file_rel
        )));
    }
    if let Some(parent) = file_abs.parent() {
        fs::create_dir_all(parent).map_err(DocPulseError::IoError)?;
    }
    fs::write(&file_abs, &content).map_err(DocPulseError::IoError)?;

    let committed = session.transaction(|tx| {
        for system_path in &new.links {
            let known: bool = tx
                .query_row(
                    "SELECT COUNT(*) FROM systems WHERE path = ?1",
                    params![system_path],
                    |row| row.get::<_, i64>(0),
                )
                .map(|c| c > 0)?;
            if !known {
                return Err(DocPulseError::NotFound(format!(
                    "system '{}' is not registered",
                    system_path
                )));
            }
        }

        tx.execute(
            "INSERT INTO adrs (id, title, status, file_path, context, decision, consequences, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                new.title,
                new.status,
                file_rel,
                new.context,
                new.decision,
                new.consequences,
                now,
                now
            ],
        )?;
        for system_path in &new.links {
            tx.execute(
                "INSERT INTO adr_systems (adr_id, system_path) VALUES (?1, ?2)",
                params![id, system_path],
            )?;
        }
        for tag in &new.tags {
            validate_tag(tag)?;
            tx.execute(
                "INSERT INTO adr_tags (adr_id, tag) VALUES (?1, ?2)",
                params![id, tag.to_lowercase()],
            )?;
        }
        Ok(())
    });

    if let Err(e) = committed {
        let _ = fs::remove_file(&file_abs);
        return Err(e);
    }

    get_adr(session, &id)?
        .ok_or_else(|| DocPulseError::Infrastructure(format!("ADR '{}' vanished after insert", id)))
}

pub fn get_adr(session: &Session, id: &str) -> Result<Option<AdrRecord>, DocPulseError> {
    let record = session
        .conn()
        .query_row(
            &format!("SELECT {} FROM adrs WHERE id = ?1", ADR_COLS),
            params![id],
            row_to_adr,
        )
        .optional()?;
    Ok(record)
}

pub fn list_adrs(session: &Session, status: Option<&str>) -> Result<Vec<AdrRecord>, DocPulseError> {
    match status {
        Some(s) => {
            validate_status(s)?;
            let mut stmt = session.conn().prepare(&format!(
                "SELECT {} FROM adrs WHERE status = ?1 ORDER BY id",
                ADR_COLS
            ))?;
            let rows = stmt.query_map(params![s], row_to_adr)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(DocPulseError::RusqliteError)
        }
        None => {
            let mut stmt = session
                .conn()
                .prepare(&format!("SELECT {} FROM adrs ORDER BY id", ADR_COLS))?;
            let rows = stmt.query_map([], row_to_adr)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(DocPulseError::RusqliteError)
        }
    }
}

pub fn update_adr(
    session: &mut Session,
    id: &str,
    title: Option<&str>,
    status: Option<&str>,
    context: Option<&str>,
    decision: Option<&str>,
    consequences: Option<&str>,
) -> Result<bool, DocPulseError> {
    if let Some(t) = title {
        validate_title(t)?;
    }
    if let Some(s) = status {
        validate_status(s)?;
    }

    let mut set_clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    for (clause, value) in [
        ("title = ?", title),
        ("status = ?", status),
        ("context = ?", context),
        ("decision = ?", decision),
        ("consequences = ?", consequences),
    ] {
        if let Some(v) = value {
            set_clauses.push(clause);
            values.push(Box::new(v.to_string()));
        }
    }
    if set_clauses.is_empty() {
        return Ok(false);
    }

    let now = time::now_rfc3339();
    set_clauses.push("updated_at = ?");
    values.push(Box::new(now));
    values.push(Box::new(id.to_string()));

    session.transaction(|tx| {
        let sql = format!("UPDATE adrs SET {} WHERE id = ?", set_clauses.join(", "));
        let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let count = tx.execute(&sql, refs.as_slice())?;
        Ok(count > 0)
    })
}

/// Delete an ADR, cascading links and tags.
pub fn delete_adr(session: &mut Session, id: &str) -> Result<bool, DocPulseError> {
    session.transaction(|tx| {
        tx.execute("DELETE FROM adr_systems WHERE adr_id = ?1", params![id])?;
        tx.execute("DELETE FROM adr_tags WHERE adr_id = ?1", params![id])?;
        let count = tx.execute("DELETE FROM adrs WHERE id = ?1", params![id])?;
        Ok(count > 0)
    })
}

/// Mark `old_id` superseded by `new_id`, wiring both back-references.
pub fn supersede_adr(session: &mut Session, old_id: &str, new_id: &str) -> Result<(), DocPulseError> {
    validate_id(old_id)?;
    validate_id(new_id)?;
    if old_id == new_id {
        return Err(DocPulseError::ValidationError(format!(
            "ADR '{}' cannot supersede itself",
            old_id
        )));
    }

    let now = time::now_rfc3339();
    session.transaction(|tx| {
        for id in [old_id, new_id] {
            let known: bool = tx
                .query_row("SELECT COUNT(*) FROM adrs WHERE id = ?1", params![id], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|c| c > 0)?;
            if !known {
                return Err(DocPulseError::NotFound(format!("ADR '{}' not found", id)));
            }
        }

        // The successor's own chain must not loop back onto old_id.
        let mut seen = std::collections::HashSet::new();
        let mut cursor = Some(new_id.to_string());
        while let Some(current) = cursor {
            if current == old_id || !seen.insert(current.clone()) {
                return Err(DocPulseError::CyclicDependency(format!(
                    "superseding '{}' with '{}' would close a supersession cycle",
                    old_id, new_id
                )));
            }
            cursor = tx
                .query_row(
                    "SELECT superseded_by FROM adrs WHERE id = ?1",
                    params![current],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
        }

        tx.execute(
            "UPDATE adrs SET status = ?1, superseded_by = ?2, updated_at = ?3 WHERE id = ?4",
            params![STATUS_SUPERSEDED, new_id, now, old_id],
        )?;
        tx.execute(
            "UPDATE adrs SET supersedes = ?1, updated_at = ?2 WHERE id = ?3",
            params![old_id, now, new_id],
        )?;
        Ok(())
    })
}

// --- Links ---

pub fn link_adr_to_system(
    session: &mut Session,
    adr_id: &str,
    system_path: &str,
) -> Result<(), DocPulseError> {
    session.transaction(|tx| {
        for (table, key, value) in [("adrs", "id", adr_id), ("systems", "path", system_path)] {
            let known: bool = tx
                .query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, key),
                    params![value],
                    |row| row.get::<_, i64>(0),
                )
                .map(|c| c > 0)?;
            if !known {
                return Err(DocPulseError::NotFound(format!(
                    "{} '{}' not found",
                    table.trim_end_matches('s'),
                    value
                )));
            }
        }
        tx.execute(
            "INSERT INTO adr_systems (adr_id, system_path) VALUES (?1, ?2)",
            params![adr_id, system_path],
        )?;
        Ok(())
    })
}

pub fn unlink_adr_from_system(
    session: &mut Session,
    adr_id: &str,
    system_path: &str,
) -> Result<bool, DocPulseError> {
    session.transaction(|tx| {
        let count = tx.execute(
            "DELETE FROM adr_systems WHERE adr_id = ?1 AND system_path = ?2",
            params![adr_id, system_path],
        )?;
        Ok(count > 0)
    })
}

pub fn list_links(session: &Session) -> Result<Vec<AdrLink>, DocPulseError> {
    let mut stmt = session
        .conn()
        .prepare("SELECT adr_id, system_path FROM adr_systems ORDER BY adr_id, system_path")?;
    let rows = stmt.query_map([], |row| {
        Ok(AdrLink {
            adr_id: row.get(0)?,
            system_path: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}

pub fn get_adrs_for_system(
    session: &Session,
    system_path: &str,
) -> Result<Vec<AdrRecord>, DocPulseError> {
    let mut stmt = session.conn().prepare(&format!(
        "SELECT a.{} FROM adrs a
         JOIN adr_systems ars ON a.id = ars.adr_id
         WHERE ars.system_path = ?1
         ORDER BY a.id",
        ADR_COLS.replace(", ", ", a.")
    ))?;
    let rows = stmt.query_map(params![system_path], row_to_adr)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}

// --- Tags ---

pub fn add_tag(session: &mut Session, adr_id: &str, tag: &str) -> Result<(), DocPulseError> {
    validate_tag(tag)?;
    let normalized = tag.to_lowercase();
    session.transaction(|tx| {
        tx.execute(
            "INSERT INTO adr_tags (adr_id, tag) VALUES (?1, ?2)",
            params![adr_id, normalized],
        )?;
        Ok(())
    })
}

pub fn remove_tag(session: &mut Session, adr_id: &str, tag: &str) -> Result<bool, DocPulseError> {
    let normalized = tag.to_lowercase();
    session.transaction(|tx| {
        let count = tx.execute(
            "DELETE FROM adr_tags WHERE adr_id = ?1 AND tag = ?2",
            params![adr_id, normalized],
        )?;
        Ok(count > 0)
    })
}

pub fn get_tags(session: &Session, adr_id: &str) -> Result<Vec<String>, DocPulseError> {
    let mut stmt = session
        .conn()
        .prepare("SELECT tag FROM adr_tags WHERE adr_id = ?1 ORDER BY tag")?;
    let rows = stmt.query_map(params![adr_id], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DocPulseError::RusqliteError)
}
