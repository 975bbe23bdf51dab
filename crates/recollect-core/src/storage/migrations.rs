//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Fragments with fingerprint dedup, embeddings and FTS5 index",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Session analytics: sessions and save points",
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

/// V1: Fragment store
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS fragments (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    fingerprint TEXT NOT NULL UNIQUE,

    -- Passage-role embedding, little-endian f32
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,

    -- NULL = global
    project TEXT,
    source_session TEXT,

    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fragments_project ON fragments(project);
CREATE INDEX IF NOT EXISTS idx_fragments_timestamp ON fragments(timestamp);
CREATE INDEX IF NOT EXISTS idx_fragments_session ON fragments(source_session);

-- FTS5 external-content index over fragment text
CREATE VIRTUAL TABLE IF NOT EXISTS fragments_fts USING fts5(
    content,
    content='fragments',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

-- Triggers to keep FTS in sync
CREATE TRIGGER IF NOT EXISTS fragments_ai AFTER INSERT ON fragments BEGIN
    INSERT INTO fragments_fts(rowid, content) VALUES (NEW.rowid, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS fragments_ad AFTER DELETE ON fragments BEGIN
    INSERT INTO fragments_fts(fragments_fts, rowid, content)
    VALUES ('delete', OLD.rowid, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS fragments_au AFTER UPDATE OF content ON fragments BEGIN
    INSERT INTO fragments_fts(fragments_fts, rowid, content)
    VALUES ('delete', OLD.rowid, OLD.content);
    INSERT INTO fragments_fts(rowid, content) VALUES (NEW.rowid, NEW.content);
END;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Session analytics
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    project TEXT,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    peak_context_percent REAL NOT NULL DEFAULT 0.0,
    clear_count INTEGER NOT NULL DEFAULT 0,
    fragments_created INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sessions_active ON sessions(ended_at);

CREATE TABLE IF NOT EXISTS save_points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL,
    context_percent REAL NOT NULL,
    fragments_saved INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_save_points_session ON save_points(session_id);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations, each in its own transaction
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.up)?;
            tx.commit()?;

            applied += 1;
        }
    }

    Ok(applied)
}
