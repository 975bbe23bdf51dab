//! Persisted auto-save guard

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Auto-save state file error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("State file IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize auto-save state: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_error(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Guard against re-archiving within one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoSaveState {
    pub last_auto_save_timestamp: Option<DateTime<Utc>>,
    pub last_auto_save_context_percent: Option<f64>,
    pub last_transcript_path: Option<PathBuf>,
    pub has_saved_this_session: bool,
}

impl AutoSaveState {
    /// State after an auto-save decision that ran an archive
    pub fn saved(now: DateTime<Utc>, context_percent: f64, transcript: &Path) -> Self {
        Self {
            last_auto_save_timestamp: Some(now),
            last_auto_save_context_percent: Some(context_percent),
            last_transcript_path: Some(transcript.to_path_buf()),
            has_saved_this_session: true,
        }
    }

    /// Start of a new session: clear only the per-session flag
    pub fn for_new_session(mut self) -> Self {
        self.has_saved_this_session = false;
        self
    }
}

/// JSON file holding the [`AutoSaveState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state; a missing or malformed file yields the default
    pub fn load(&self) -> AutoSaveState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AutoSaveState::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Unreadable auto-save state, using default: {}", e);
                return AutoSaveState::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), "Malformed auto-save state, using default: {}", e);
            AutoSaveState::default()
        })
    }

    /// Write the state atomically (temp file, then rename)
    pub fn save(&self, state: &AutoSaveState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| io_error(&tmp, source))?;
        std::fs::rename(&tmp, &self.path).map_err(|source| io_error(&self.path, source))?;
        Ok(())
    }
}
