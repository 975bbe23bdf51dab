//! SQLite Storage Implementation
//!
//! One connection per invocation. Migrations run on open, then a single
//! `IMMEDIATE` transaction covers every read and write until [`Storage::close`]
//! commits it. Dropping the handle without closing rolls everything back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use crate::embeddings::{cosine_similarity, vector_from_bytes, vector_to_bytes};
use crate::memory::{fingerprint, Fragment, FragmentDraft, InsertOutcome, Scope, ScoredId, StoreStats};
use crate::search::{escape_like, query_terms, sanitize_fts5_query};

/// Environment variable holding the SQLCipher key (`encryption` feature)
#[cfg(feature = "encryption")]
pub const ENCRYPTION_KEY_ENV: &str = "RECOLLECT_ENCRYPTION_KEY";

/// Default synthetic score step of the keyword fallback
const DEFAULT_FALLBACK_STEP: f64 = 0.1;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Fragment not found
    #[error("Fragment not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Rejected input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// An update would give a fragment the content of another one
    #[error("Content of fragment {id} already stored as {existing_id}")]
    DuplicateContent { id: String, existing_id: String },
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Timestamps are stored as fixed-width RFC 3339 so text order is time order
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse RFC3339 timestamp
pub(crate) fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                )),
            )
        })
}

pub(crate) fn parse_embedding(bytes: &[u8]) -> rusqlite::Result<Vec<f32>> {
    vector_from_bytes(bytes).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Blob,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Invalid embedding blob of {} bytes", bytes.len()),
            )),
        )
    })
}

// ============================================================================
// SCOPE FILTER
// ============================================================================

/// SQL predicate and bound parameters selecting a [`Scope`]
struct ScopeFilter {
    clause: &'static str,
    params: Vec<SqlValue>,
}

impl ScopeFilter {
    fn new(scope: &Scope) -> Self {
        match scope {
            Scope::All => Self {
                clause: "1 = 1",
                params: vec![],
            },
            Scope::Global => Self {
                clause: "f.project IS NULL",
                params: vec![],
            },
            Scope::Project(p) => Self {
                clause: "f.project = ?",
                params: vec![SqlValue::Text(p.clone())],
            },
        }
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Fragment store backed by one SQLite connection
pub struct Storage {
    conn: Connection,
    path: PathBuf,
    keyword_index: bool,
    fallback_step: f64,
    finished: bool,
}

impl Storage {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var(ENCRYPTION_KEY_ENV)
                && !key.is_empty()
            {
                conn.pragma_update(None, "key", &key)?;
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let conn = Connection::open(path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }

        Self::configure_connection(&conn)?;

        let applied = super::migrations::apply_migrations(&conn)?;
        if applied > 0 {
            tracing::info!(applied, path = %path.display(), "Database schema migrated");
        }

        conn.execute_batch("BEGIN IMMEDIATE")?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            keyword_index: true,
            fallback_step: DEFAULT_FALLBACK_STEP,
            finished: false,
        })
    }

    /// Use (or bypass) the FTS5 index for keyword candidates
    pub fn with_keyword_index(mut self, enabled: bool) -> Self {
        self.keyword_index = enabled;
        self
    }

    /// Synthetic score step of the keyword fallback
    pub fn with_fallback_step(mut self, step: f64) -> Self {
        self.fallback_step = step;
        self
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commit everything written through this handle
    pub fn close(mut self) -> Result<()> {
        self.finished = true;
        self.conn.execute_batch("COMMIT")?;
        tracing::debug!(path = %self.path.display(), "Storage committed");
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Convert a row to Fragment
    fn row_to_fragment(row: &rusqlite::Row) -> rusqlite::Result<Fragment> {
        let embedding: Vec<u8> = row.get("embedding")?;
        let timestamp: String = row.get("timestamp")?;
        let created_at: String = row.get("created_at")?;

        Ok(Fragment {
            id: row.get("id")?,
            content: row.get("content")?,
            fingerprint: row.get("fingerprint")?,
            embedding: parse_embedding(&embedding)?,
            project: row.get("project")?,
            source_session: row.get("source_session")?,
            timestamp: parse_timestamp(&timestamp, "timestamp")?,
            created_at: parse_timestamp(&created_at, "created_at")?,
        })
    }

    fn id_for_fingerprint(&self, fingerprint: &str) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM fragments WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Store a fragment unless its fingerprint already exists
    ///
    /// On a match nothing is written and the existing id is returned with
    /// `is_duplicate = true`.
    pub fn insert_or_detect_duplicate(&self, draft: FragmentDraft) -> Result<InsertOutcome> {
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(StorageError::InvalidInput(
                "fragment content is empty".to_string(),
            ));
        }

        let fingerprint = fingerprint(content);
        if let Some(existing) = self.id_for_fingerprint(&fingerprint)? {
            return Ok(InsertOutcome {
                id: existing,
                is_duplicate: true,
            });
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let timestamp = draft.timestamp.unwrap_or(now);

        self.conn.execute(
            "INSERT INTO fragments (
                id, content, fingerprint, embedding, dimensions,
                project, source_session, timestamp, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                content,
                fingerprint,
                vector_to_bytes(&draft.embedding),
                draft.embedding.len() as i64,
                draft.project,
                draft.source_session,
                format_timestamp(&timestamp),
                format_timestamp(&now),
            ],
        )?;

        Ok(InsertOutcome {
            id,
            is_duplicate: false,
        })
    }

    /// Replace content, fingerprint and embedding of a fragment
    ///
    /// Returns `false` when the id does not exist.
    pub fn update(&self, id: &str, content: &str, embedding: &[f32]) -> Result<bool> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StorageError::InvalidInput(
                "fragment content is empty".to_string(),
            ));
        }

        let fingerprint = fingerprint(content);
        if let Some(existing) = self.id_for_fingerprint(&fingerprint)?
            && existing != id
        {
            return Err(StorageError::DuplicateContent {
                id: id.to_string(),
                existing_id: existing,
            });
        }

        let rows = self.conn.execute(
            "UPDATE fragments
             SET content = ?2, fingerprint = ?3, embedding = ?4, dimensions = ?5
             WHERE id = ?1",
            params![
                id,
                content,
                fingerprint,
                vector_to_bytes(embedding),
                embedding.len() as i64,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Delete a fragment
    pub fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM fragments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Delete every fragment of a project (`None` = the global fragments)
    pub fn delete_by_project(&self, project: Option<&str>) -> Result<usize> {
        let rows = match project {
            Some(p) => self
                .conn
                .execute("DELETE FROM fragments WHERE project = ?1", params![p])?,
            None => self
                .conn
                .execute("DELETE FROM fragments WHERE project IS NULL", [])?,
        };
        tracing::info!(project = project.unwrap_or("global"), deleted = rows, "Deleted project fragments");
        Ok(rows)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Whether content with the same fingerprint is stored
    pub fn exists(&self, content: &str) -> Result<bool> {
        Ok(self.id_for_fingerprint(&fingerprint(content))?.is_some())
    }

    /// Fetch a fragment by id
    pub fn fetch(&self, id: &str) -> Result<Option<Fragment>> {
        let fragment = self
            .conn
            .query_row(
                "SELECT * FROM fragments WHERE id = ?1",
                params![id],
                Self::row_to_fragment,
            )
            .optional()?;
        Ok(fragment)
    }

    /// Fetch several fragments, in the order of `ids`; unknown ids are skipped
    pub fn fetch_many(&self, ids: &[String]) -> Result<Vec<Fragment>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM fragments WHERE id = ?1")?;

        let mut fragments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(fragment) = stmt
                .query_row(params![id], Self::row_to_fragment)
                .optional()?
            {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    /// Most recent fragments of a scope, timestamp descending
    pub fn list_recent(&self, scope: &Scope, limit: usize) -> Result<Vec<Fragment>> {
        let filter = ScopeFilter::new(scope);
        let sql = format!(
            "SELECT * FROM fragments f WHERE {} ORDER BY f.timestamp DESC, f.rowid DESC LIMIT ?",
            filter.clause
        );

        let mut values = filter.params;
        values.push(SqlValue::Integer(limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_fragment)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Aggregate statistics of a scope
    pub fn stats(&self, scope: &Scope) -> Result<StoreStats> {
        let filter = ScopeFilter::new(scope);
        let sql = format!(
            "SELECT COUNT(*),
                    COUNT(DISTINCT f.source_session),
                    MIN(f.timestamp),
                    MAX(f.timestamp),
                    COALESCE(SUM(LENGTH(CAST(f.content AS BLOB)) + LENGTH(f.embedding)), 0)
             FROM fragments f WHERE {}",
            filter.clause
        );

        let (fragment_count, session_count, oldest, newest, size_bytes): (
            i64,
            i64,
            Option<String>,
            Option<String>,
            i64,
        ) = self
            .conn
            .query_row(&sql, params_from_iter(filter.params.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;

        let parse = |value: Option<String>, field: &str| -> Result<Option<DateTime<Utc>>> {
            value
                .map(|s| parse_timestamp(&s, field))
                .transpose()
                .map_err(|e| StorageError::InvalidTimestamp(e.to_string()))
        };

        Ok(StoreStats {
            fragment_count,
            session_count,
            oldest: parse(oldest, "oldest")?,
            newest: parse(newest, "newest")?,
            size_bytes,
        })
    }

    // ========================================================================
    // CANDIDATE LISTS
    // ========================================================================

    /// Fragments of a scope by descending cosine similarity to `query`
    ///
    /// Fragments whose embedding dimension differs from the query are skipped.
    pub fn vector_candidates(
        &self,
        query: &[f32],
        scope: &Scope,
        limit: usize,
    ) -> Result<Vec<ScoredId>> {
        if query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let filter = ScopeFilter::new(scope);
        let sql = format!(
            "SELECT f.id, f.embedding, f.dimensions FROM fragments f WHERE {}",
            filter.clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut scored = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            let (id, bytes, dimensions) = row?;
            if dimensions as usize != query.len() {
                skipped += 1;
                continue;
            }
            let Some(vector) = vector_from_bytes(&bytes) else {
                skipped += 1;
                continue;
            };
            scored.push(ScoredId::new(
                id,
                cosine_similarity(query, &vector) as f64,
            ));
        }

        if skipped > 0 {
            tracing::debug!(skipped, "Skipped fragments with mismatched embeddings");
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Fragments of a scope matching the query's keywords
    ///
    /// Uses FTS5 BM25 (`score = -bm25`) when the index is enabled; if that is
    /// disabled or the query fails, falls back to an all-terms substring match
    /// ordered by recency with synthetic scores `1 - step * rank`.
    pub fn keyword_candidates(
        &self,
        query: &str,
        scope: &Scope,
        limit: usize,
    ) -> Result<Vec<ScoredId>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        if self.keyword_index {
            let Some(match_expr) = sanitize_fts5_query(query) else {
                return Ok(vec![]);
            };
            match self.fts_candidates(&match_expr, scope, limit) {
                Ok(candidates) => return Ok(candidates),
                Err(e) => {
                    tracing::debug!("FTS5 keyword query failed, using substring fallback: {}", e);
                }
            }
        }

        self.substring_candidates(query, scope, limit)
    }

    fn fts_candidates(&self, match_expr: &str, scope: &Scope, limit: usize) -> Result<Vec<ScoredId>> {
        let filter = ScopeFilter::new(scope);
        let sql = format!(
            "SELECT f.id, bm25(fragments_fts) AS bm25_score
             FROM fragments_fts
             JOIN fragments f ON f.rowid = fragments_fts.rowid
             WHERE fragments_fts MATCH ? AND {}
             ORDER BY bm25_score
             LIMIT ?",
            filter.clause
        );

        let mut values = vec![SqlValue::Text(match_expr.to_string())];
        values.extend(filter.params);
        values.push(SqlValue::Integer(limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(ScoredId::new(row.get::<_, String>(0)?, -row.get::<_, f64>(1)?))
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn substring_candidates(&self, query: &str, scope: &Scope, limit: usize) -> Result<Vec<ScoredId>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let filter = ScopeFilter::new(scope);
        let term_clauses = vec!["f.content LIKE ? ESCAPE '\\'"; terms.len()].join(" AND ");
        let sql = format!(
            "SELECT f.id FROM fragments f
             WHERE {} AND {}
             ORDER BY f.timestamp DESC, f.rowid DESC
             LIMIT ?",
            term_clauses, filter.clause
        );

        let mut values: Vec<SqlValue> = terms
            .iter()
            .map(|t| SqlValue::Text(format!("%{}%", escape_like(t))))
            .collect();
        values.extend(filter.params);
        values.push(SqlValue::Integer(limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for (rank, id) in ids.enumerate() {
            result.push(ScoredId::new(id?, 1.0 - self.fallback_step * rank as f64));
        }
        Ok(result)
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if !self.finished && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Failed to roll back uncommitted changes: {}", e);
            } else {
                tracing::debug!("Storage dropped without close, changes rolled back");
            }
        }
    }
}
