//! Automation
//!
//! Threshold-driven auto-save and auto-clear. Each invocation receives a
//! context-utilization percentage, consults the persisted [`AutoSaveState`]
//! and decides whether to archive the transcript and build a restoration
//! context.
//!
//! | percent                          | guard        | action     |
//! |----------------------------------|--------------|------------|
//! | below save threshold             | any          | none       |
//! | at/above clear threshold, enabled| ignored      | auto-clear |
//! | at/above save threshold          | new path     | auto-save  |
//! | at/above save threshold          | already saved| none       |

mod restore;
mod state;

pub use restore::{
    assemble_restoration, build_restoration_context, estimate_tokens, RestorationContext,
    RestoredFragment, MIN_USEFUL_REMAINDER, RESTORATION_QUERY, TOKENS_PER_CHAR,
};
pub use state::{AutoSaveState, StateError, StateStore};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::{archive_parsed, ArchiveReport, ArchiveTarget};
use crate::config::Config;
use crate::context::MemoryContext;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::memory::Scope;
use crate::storage::SavePointRecord;
use crate::transcript::{estimate_context_percent, parse_transcript, Transcript};

/// Whether an ordinary auto-save should run
///
/// Below the save threshold: never. A transcript other than the last one
/// saved: always. Otherwise only if nothing was saved this session.
pub fn should_auto_save(
    state: &AutoSaveState,
    context_percent: f64,
    transcript_path: &Path,
    config: &Config,
) -> bool {
    if context_percent < config.auto_save_threshold {
        return false;
    }
    if state.last_transcript_path.as_deref() != Some(transcript_path) {
        return true;
    }
    !state.has_saved_this_session
}

/// Whether the auto-clear escalation applies
pub fn should_auto_clear(context_percent: f64, config: &Config) -> bool {
    config.auto_clear_enabled && context_percent >= config.auto_clear_threshold
}

/// What an invocation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationAction {
    /// Below threshold or guarded
    None,
    /// Archived once for this session
    AutoSave,
    /// Archived unconditionally and counted a clear
    AutoClear,
}

/// Input of one automation invocation
#[derive(Debug, Clone)]
pub struct AutomationRequest {
    /// Transcript of the running conversation
    pub transcript_path: PathBuf,
    /// Context utilization; estimated from transcript token usage when absent
    pub context_percent: Option<f64>,
    /// Project the fragments are filed under
    pub project: Option<String>,
    /// Session id reported by the caller
    pub session_id: Option<String>,
}

/// Outcome of one automation invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationReport {
    pub action: AutomationAction,
    pub context_percent: f64,
    pub archive: Option<ArchiveReport>,
    pub restoration: Option<RestorationContext>,
    /// The caller should clear its working context
    pub recommend_clear: bool,
    /// Active analytics session
    pub session_id: String,
}

/// Run one automation step
///
/// The updated guard is staged on the context only once every step has
/// succeeded; [`MemoryContext::close`] writes it after the store commits.
/// Any failure therefore leaves the guard as it was and the next
/// invocation retries.
pub fn run_automation<E: Embedder>(
    ctx: &MemoryContext<E>,
    request: &AutomationRequest,
    now: DateTime<Utc>,
) -> Result<AutomationReport> {
    let config = ctx.config();
    let storage = ctx.storage();
    let state = ctx.auto_save_state();

    let mut transcript: Option<Transcript> = None;
    let context_percent = match request.context_percent {
        Some(percent) => percent,
        None => {
            let parsed = parse_transcript(&request.transcript_path)?;
            let percent = estimate_context_percent(&parsed, config.context_window_tokens);
            transcript = Some(parsed);
            percent
        }
    }
    .clamp(0.0, 100.0);

    let session = storage.ensure_active_session(
        request.session_id.as_deref(),
        request.project.as_deref(),
        now,
    )?;
    storage.raise_peak(&session.session_id, context_percent)?;

    let action = if should_auto_clear(context_percent, config) {
        AutomationAction::AutoClear
    } else if should_auto_save(&state, context_percent, &request.transcript_path, config) {
        AutomationAction::AutoSave
    } else {
        tracing::debug!(context_percent, "No automation action");
        return Ok(AutomationReport {
            action: AutomationAction::None,
            context_percent,
            archive: None,
            restoration: None,
            recommend_clear: false,
            session_id: session.session_id,
        });
    };

    let transcript = match transcript {
        Some(t) => t,
        None => parse_transcript(&request.transcript_path)?,
    };
    let target = ArchiveTarget {
        project: request.project.clone(),
        session_id: request.session_id.clone(),
    };
    let archive = archive_parsed(storage, ctx.embedder(), config, &transcript, &target, &mut |_| {})?;

    if archive.archived > 0 {
        storage.record_save_point(
            &session.session_id,
            &SavePointRecord {
                timestamp: now,
                context_percent,
                fragments_saved: archive.archived as i64,
            },
        )?;
        storage.add_fragments_created(&session.session_id, archive.archived as i64)?;
    }

    let build_restoration = match action {
        AutomationAction::AutoClear => {
            storage.record_clear(&session.session_id)?;
            true
        }
        _ => archive.archived > 0,
    };

    let restoration = if build_restoration {
        let scope = Scope::from_project(request.project.as_deref());
        Some(ctx.restore_at(
            &scope,
            config.restoration_message_count,
            config.restoration_token_budget,
            now,
        )?)
    } else {
        None
    };

    ctx.stage_auto_save_state(AutoSaveState::saved(
        now,
        context_percent,
        &request.transcript_path,
    ));

    tracing::info!(
        action = ?action,
        context_percent,
        archived = archive.archived,
        duplicates = archive.duplicates,
        "Automation archived transcript"
    );

    Ok(AutomationReport {
        action,
        context_percent,
        recommend_clear: restoration.is_some(),
        archive: Some(archive),
        restoration,
        session_id: session.session_id,
    })
}
