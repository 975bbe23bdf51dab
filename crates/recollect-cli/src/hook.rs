//! Conversation hook payloads
//!
//! The host application pipes one JSON object per hook invocation to
//! `recollect hook`. Only the fields below are read; anything else is ignored.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Event name that marks the start of a new conversation session
pub const SESSION_START: &str = "SessionStart";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookPayload {
    pub session_id: Option<String>,
    pub transcript_path: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub hook_event_name: Option<String>,
    /// Utilization reported by the host, when it knows it
    pub context_percent: Option<f64>,
}

impl HookPayload {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_session_start(&self) -> bool {
        self.hook_event_name.as_deref() == Some(SESSION_START)
    }

    /// Project name: explicit override, else the working directory's name
    pub fn project(&self, explicit: Option<&str>) -> Option<String> {
        if let Some(project) = explicit {
            return Some(project.to_string());
        }
        self.cwd.as_deref().and_then(directory_name)
    }
}

fn directory_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
