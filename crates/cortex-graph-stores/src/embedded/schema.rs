//! SQLite schema for the embedded graph store.
//!
//! Three tables, all keyed by brain through `entities`:
//! - `entities`: one row per `(brain_id, name, label)`
//! - `descriptions`: provenance-tagged descriptions of an entity
//! - `relations`: directed labeled edges between two entities of one brain

use rusqlite::Connection;

use cortex_core::error::CortexResult;

/// SQL statements for creating the graph schema.
pub const CREATE_ENTITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brain_id TEXT NOT NULL,
    name TEXT NOT NULL,
    label TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(brain_id, name, label)
)
"#;

/// Endpoint resolution looks entities up by name within a brain.
pub const CREATE_ENTITIES_NAME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_entities_brain_name ON entities(brain_id, name)
"#;

pub const CREATE_DESCRIPTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS descriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    source_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(entity_id, text, source_id)
)
"#;

/// Index for provenance deletes.
pub const CREATE_DESCRIPTIONS_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_descriptions_source ON descriptions(source_id)
"#;

pub const CREATE_RELATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brain_id TEXT NOT NULL,
    source_entity INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    target_entity INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    relation TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(source_entity, target_entity, relation)
)
"#;

pub const CREATE_RELATIONS_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_entity)
"#;

pub const CREATE_RELATIONS_TARGET_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_entity)
"#;

/// Initialize the graph schema in the given database connection.
///
/// Safe to call multiple times.
pub fn init_schema(conn: &Connection) -> CortexResult<()> {
    // Cascades depend on this, and it is per connection.
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(CREATE_ENTITIES_TABLE, [])?;
    conn.execute(CREATE_DESCRIPTIONS_TABLE, [])?;
    conn.execute(CREATE_RELATIONS_TABLE, [])?;

    conn.execute(CREATE_ENTITIES_NAME_INDEX, [])?;
    conn.execute(CREATE_DESCRIPTIONS_SOURCE_INDEX, [])?;
    conn.execute(CREATE_RELATIONS_SOURCE_INDEX, [])?;
    conn.execute(CREATE_RELATIONS_TARGET_INDEX, [])?;

    Ok(())
}
