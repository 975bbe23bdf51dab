//! Session analytics
//!
//! At most one session is active (`ended_at IS NULL`) at a time; starting a
//! session ends whichever one was active.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sqlite::{format_timestamp, parse_timestamp, Result, Storage};

/// A recorded auto-save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePointRecord {
    pub timestamp: DateTime<Utc>,
    pub context_percent: f64,
    pub fragments_saved: i64,
}

/// A working session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub project: Option<String>,
    pub started_at: DateTime<Utc>,
    /// `None` while active
    pub ended_at: Option<DateTime<Utc>>,
    /// Highest context percentage seen while active
    pub peak_context_percent: f64,
    /// Save points in chronological order
    pub save_points: Vec<SavePointRecord>,
    pub clear_count: i64,
    pub fragments_created: i64,
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

const SESSION_COLUMNS: &str = "session_id, project, started_at, ended_at, \
     peak_context_percent, clear_count, fragments_created";

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;

    Ok(SessionRecord {
        session_id: row.get("session_id")?,
        project: row.get("project")?,
        started_at: parse_timestamp(&started_at, "started_at")?,
        ended_at: ended_at
            .map(|s| parse_timestamp(&s, "ended_at"))
            .transpose()?,
        peak_context_percent: row.get("peak_context_percent")?,
        save_points: vec![],
        clear_count: row.get("clear_count")?,
        fragments_created: row.get("fragments_created")?,
    })
}

impl Storage {
    /// Start a session, ending the currently active one
    ///
    /// Without an id a UUID is generated. Restarting a known id reactivates it.
    pub fn start_session(
        &self,
        session_id: Option<&str>,
        project: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        let ended = self.end_session(now)?;
        if let Some(prior) = &ended {
            tracing::debug!(session = %prior.session_id, "Ended prior session");
        }

        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let conn = self.conn();
        let reactivated = conn.execute(
            "UPDATE sessions SET ended_at = NULL, project = COALESCE(?2, project)
             WHERE session_id = ?1",
            params![session_id, project],
        )?;
        if reactivated == 0 {
            conn.execute(
                "INSERT INTO sessions (session_id, project, started_at) VALUES (?1, ?2, ?3)",
                params![session_id, project, format_timestamp(&now)],
            )?;
        }

        tracing::info!(session = %session_id, "Session started");
        self.session(&session_id)?
            .ok_or_else(|| super::StorageError::NotFound(session_id))
    }

    /// End the active session, if any, returning it
    pub fn end_session(&self, now: DateTime<Utc>) -> Result<Option<SessionRecord>> {
        let Some(active) = self.active_session()? else {
            return Ok(None);
        };

        self.conn().execute(
            "UPDATE sessions SET ended_at = ?2 WHERE session_id = ?1",
            params![active.session_id, format_timestamp(&now)],
        )?;

        self.session(&active.session_id)
    }

    /// The active session with its save points
    pub fn active_session(&self) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE ended_at IS NULL
             ORDER BY started_at DESC LIMIT 1",
            SESSION_COLUMNS
        );
        let session = self
            .conn()
            .query_row(&sql, [], row_to_session)
            .optional()?;

        match session {
            Some(mut session) => {
                session.save_points = self.save_points(&session.session_id)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// The active session, starting one when none is active
    pub fn ensure_active_session(
        &self,
        session_id: Option<&str>,
        project: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        match self.active_session()? {
            Some(session) => Ok(session),
            None => self.start_session(session_id, project, now),
        }
    }

    /// A session by id with its save points
    pub fn session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let sql = format!("SELECT {} FROM sessions WHERE session_id = ?1", SESSION_COLUMNS);
        let session = self
            .conn()
            .query_row(&sql, params![session_id], row_to_session)
            .optional()?;

        match session {
            Some(mut session) => {
                session.save_points = self.save_points(session_id)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Most recently started sessions, without save points
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM sessions ORDER BY started_at DESC LIMIT ?1",
            SESSION_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], row_to_session)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn save_points(&self, session_id: &str) -> Result<Vec<SavePointRecord>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT timestamp, context_percent, fragments_saved FROM save_points
             WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            let timestamp: String = row.get(0)?;
            Ok(SavePointRecord {
                timestamp: parse_timestamp(&timestamp, "timestamp")?,
                context_percent: row.get(1)?,
                fragments_saved: row.get(2)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Raise the peak context percentage of an active session
    ///
    /// Never lowers it.
    pub fn raise_peak(&self, session_id: &str, context_percent: f64) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET peak_context_percent = MAX(peak_context_percent, ?2)
             WHERE session_id = ?1 AND ended_at IS NULL",
            params![session_id, context_percent],
        )?;
        Ok(())
    }

    /// Append a save point to a session
    pub fn record_save_point(&self, session_id: &str, point: &SavePointRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO save_points (session_id, timestamp, context_percent, fragments_saved)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                format_timestamp(&point.timestamp),
                point.context_percent,
                point.fragments_saved,
            ],
        )?;
        Ok(())
    }

    /// Count newly archived fragments against a session
    pub fn add_fragments_created(&self, session_id: &str, count: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET fragments_created = fragments_created + ?2 WHERE session_id = ?1",
            params![session_id, count],
        )?;
        Ok(())
    }

    /// Increment a session's clear counter
    pub fn record_clear(&self, session_id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET clear_count = clear_count + 1 WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_single_active_session() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("test.db")).unwrap();
        let now = Utc::now();

        let first = storage.start_session(Some("one"), Some("api"), now).unwrap();
        assert!(first.is_active());
        let second = storage
            .start_session(Some("two"), None, now + Duration::seconds(1))
            .unwrap();

        let active = storage.active_session().unwrap().unwrap();
        assert_eq!(active.session_id, second.session_id);
        assert!(!storage.session("one").unwrap().unwrap().is_active());
    }

    #[test]
    fn test_peak_is_monotonic() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("test.db")).unwrap();
        let session = storage.ensure_active_session(None, None, Utc::now()).unwrap();

        storage.raise_peak(&session.session_id, 72.0).unwrap();
        storage.raise_peak(&session.session_id, 40.0).unwrap();
        let session = storage.active_session().unwrap().unwrap();
        assert_eq!(session.peak_context_percent, 72.0);
    }

    #[test]
    fn test_save_points_and_counters() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("test.db")).unwrap();
        let now = Utc::now();
        let session = storage.start_session(None, None, now).unwrap();

        for (percent, saved) in [(71.0, 3), (85.0, 2)] {
            storage
                .record_save_point(
                    &session.session_id,
                    &SavePointRecord {
                        timestamp: now,
                        context_percent: percent,
                        fragments_saved: saved,
                    },
                )
                .unwrap();
            storage.add_fragments_created(&session.session_id, saved).unwrap();
        }
        storage.record_clear(&session.session_id).unwrap();

        let session = storage.active_session().unwrap().unwrap();
        assert_eq!(session.save_points.len(), 2);
        assert_eq!(session.save_points[0].context_percent, 71.0);
        assert_eq!(session.fragments_created, 5);
        assert_eq!(session.clear_count, 1);

        let ended = storage.end_session(now).unwrap().unwrap();
        assert!(!ended.is_active());
        assert!(storage.active_session().unwrap().is_none());
        assert!(storage.end_session(now).unwrap().is_none());
    }
}
