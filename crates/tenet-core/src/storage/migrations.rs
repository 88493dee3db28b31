//! Database migrations
//!
//! Versioned schema definitions applied by the writer connection at startup.

use rusqlite::Connection;

use crate::error::Result;

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memories, beliefs, relationships, conflicts",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Deprecation-chain indexes and conflict lookup index",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    content TEXT NOT NULL,

    -- Category, denormalized for filtering; full label as JSON
    category TEXT NOT NULL,
    category_primary TEXT NOT NULL,
    category_confidence REAL NOT NULL DEFAULT 0.5,

    -- Metadata
    metadata TEXT NOT NULL DEFAULT '{}',
    importance REAL,
    meta_source TEXT,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,

    -- Embedding: full vector of the configured dimension or nothing
    embedding BLOB,
    embedding_dims INTEGER,

    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_memories_agent_active ON memories(agent_id, active);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

CREATE TABLE IF NOT EXISTS beliefs (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    statement TEXT NOT NULL,
    confidence REAL NOT NULL,
    polarity TEXT NOT NULL DEFAULT 'positive',

    evidence_memory_ids TEXT NOT NULL DEFAULT '[]',
    category TEXT NOT NULL,
    category_primary TEXT NOT NULL,

    reinforcement_count INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1,
    tags TEXT NOT NULL DEFAULT '[]',

    embedding BLOB,
    embedding_dims INTEGER,

    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_beliefs_agent_active ON beliefs(agent_id, active);

CREATE TABLE IF NOT EXISTS belief_relationships (
    id TEXT PRIMARY KEY,
    source_belief_id TEXT NOT NULL,
    target_belief_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    strength REAL NOT NULL DEFAULT 1.0,
    metadata TEXT,

    active INTEGER NOT NULL DEFAULT 1,
    effective_from TEXT,
    effective_until TEXT,
    deprecation_reason TEXT,
    priority INTEGER NOT NULL DEFAULT 0,

    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_relationships_source ON belief_relationships(source_belief_id);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON belief_relationships(target_belief_id);
CREATE INDEX IF NOT EXISTS idx_relationships_agent ON belief_relationships(agent_id, active);

CREATE TABLE IF NOT EXISTS belief_conflicts (
    id TEXT PRIMARY KEY,
    belief_id TEXT NOT NULL,
    memory_id TEXT,
    conflicting_belief_id TEXT,
    agent_id TEXT NOT NULL,
    description TEXT NOT NULL,

    resolution TEXT,
    resolution_details TEXT,
    resolution_confidence REAL NOT NULL DEFAULT 0.0,

    detected_at TEXT NOT NULL,
    resolved_at TEXT,
    resolved INTEGER NOT NULL DEFAULT 0,
    severity TEXT NOT NULL DEFAULT 'LOW'
);

CREATE INDEX IF NOT EXISTS idx_conflicts_agent ON belief_conflicts(agent_id, resolved);
"#;

/// V2: push-down support for deprecation queries
const MIGRATION_V2_UP: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_type
    ON belief_relationships(relationship_type, active);
CREATE INDEX IF NOT EXISTS idx_conflicts_memory ON belief_conflicts(memory_id);
CREATE INDEX IF NOT EXISTS idx_conflicts_belief ON belief_conflicts(belief_id);
"#;

/// Apply pending migrations in order, recording each in `schema_migrations`
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::debug!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        conn.execute_batch(migration.up)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_unique() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[0].version < window[1].version);
        }
    }

    #[test]
    fn apply_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);
    }

    #[test]
    fn schema_has_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();

        for table in ["memories", "beliefs", "belief_relationships", "belief_conflicts"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
