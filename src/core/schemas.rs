//! Centralized schema definitions for the docpulse registry.
//!
//! One SQLite database (`context.db`) holds five collections:
//! 1. systems: registered code modules keyed by repo-relative path.
//! 2. system_dependencies: directed edges between registered systems.
//! 3. adrs: Architecture Decision Records plus supersession references.
//! 4. adr_systems: many-to-many ADR <-> system links.
//! 5. adr_tags: many-to-many lowercase labels.

pub const CONTEXT_DB_NAME: &str = "context.db";

pub const SCHEMA_SYSTEMS: &str = "
    CREATE TABLE IF NOT EXISTS systems (
        path TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const SCHEMA_SYSTEM_DEPENDENCIES: &str = "
    CREATE TABLE IF NOT EXISTS system_dependencies (
        system_path TEXT NOT NULL,
        depends_on TEXT NOT NULL,
        PRIMARY KEY (system_path, depends_on),
        CHECK (system_path != depends_on),
        FOREIGN KEY (system_path) REFERENCES systems(path) ON DELETE CASCADE,
        FOREIGN KEY (depends_on) REFERENCES systems(path) ON DELETE CASCADE
    )
";

pub const SCHEMA_ADRS: &str = "
    CREATE TABLE IF NOT EXISTS adrs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('proposed', 'accepted', 'deprecated', 'superseded')),
        file_path TEXT NOT NULL UNIQUE,
        context TEXT,
        decision TEXT,
        consequences TEXT,
        supersedes TEXT,
        superseded_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

// system_path intentionally carries no foreign key: inserts are validated
// by the CRUD layer, but rows written by external tools must remain
// representable so the ADR validator can surface them as orphans.
pub const SCHEMA_ADR_SYSTEMS: &str = "
    CREATE TABLE IF NOT EXISTS adr_systems (
        adr_id TEXT NOT NULL,
        system_path TEXT NOT NULL,
        PRIMARY KEY (adr_id, system_path),
        FOREIGN KEY (adr_id) REFERENCES adrs(id) ON DELETE CASCADE
    )
";

pub const SCHEMA_ADR_TAGS: &str = "
    CREATE TABLE IF NOT EXISTS adr_tags (
        adr_id TEXT NOT NULL,
        tag TEXT NOT NULL,
        PRIMARY KEY (adr_id, tag),
        FOREIGN KEY (adr_id) REFERENCES adrs(id) ON DELETE CASCADE
    )
";

pub const INDEX_DEPENDENCIES_REVERSE: &str =
    "CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on ON system_dependencies(depends_on)";

pub const INDEX_ADR_SYSTEMS_PATH: &str =
    "CREATE INDEX IF NOT EXISTS idx_adr_systems_path ON adr_systems(system_path)";

pub const INDEX_ADRS_STATUS: &str = "CREATE INDEX IF NOT EXISTS idx_adrs_status ON adrs(status)";
