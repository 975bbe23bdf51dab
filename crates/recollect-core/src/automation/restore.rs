//! Restoration context
//!
//! A token-budgeted digest of recent relevant fragments, shown after an
//! archive so the work can resume once the context is cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::memory::{RankedFragment, Scope};
use crate::search::HybridRetriever;

/// Fixed retrieval query for restoration
pub const RESTORATION_QUERY: &str =
    "recent work summary key decisions implementation progress next steps";

/// Rough token cost of one character
pub const TOKENS_PER_CHAR: f64 = 0.25;

/// A partial fragment is only added when at least this many tokens remain
pub const MIN_USEFUL_REMAINDER: usize = 50;

const ELLIPSIS: &str = "...";

/// Token estimate of a text: `ceil(chars * 0.25)`
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 * TOKENS_PER_CHAR).ceil() as usize
}

/// One fragment as included in a restoration context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredFragment {
    pub id: String,
    pub content: String,
    /// True when `content` was cut to fit the budget
    pub truncated: bool,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub project: Option<String>,
}

/// Result of the restoration builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationContext {
    pub has_content: bool,
    pub summary: String,
    pub fragments: Vec<RestoredFragment>,
    pub estimated_tokens: usize,
}

impl RestorationContext {
    /// Plain-text rendering for display before a manual clear
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.summary);
        for (i, fragment) in self.fragments.iter().enumerate() {
            out.push_str(&format!(
                "\n\n[{}] {} ({})\n{}",
                i + 1,
                fragment.timestamp.format("%Y-%m-%d %H:%M"),
                fragment.project.as_deref().unwrap_or(crate::memory::GLOBAL_PROJECT),
                fragment.content
            ));
        }
        out
    }
}

/// Greedy budgeted selection over ranked candidates
///
/// Candidates are taken in order until `message_count` are collected. When a
/// candidate would push the total over `token_budget`, a copy cut to the
/// remaining budget is added if more than [`MIN_USEFUL_REMAINDER`] tokens
/// remain, and selection stops either way.
pub fn assemble_restoration(
    candidates: Vec<RankedFragment>,
    scope: &Scope,
    message_count: usize,
    token_budget: usize,
) -> RestorationContext {
    let mut fragments: Vec<RestoredFragment> = Vec::new();
    let mut used = 0usize;

    for candidate in candidates {
        if fragments.len() >= message_count {
            break;
        }

        let cost = estimate_tokens(&candidate.fragment.content);
        if used + cost <= token_budget {
            used += cost;
            fragments.push(restored(candidate, None));
            continue;
        }

        let remaining = token_budget.saturating_sub(used);
        if remaining > MIN_USEFUL_REMAINDER {
            let max_chars = (remaining as f64 / TOKENS_PER_CHAR).floor() as usize;
            let fragment = restored(candidate, Some(max_chars));
            used += estimate_tokens(&fragment.content);
            fragments.push(fragment);
        }
        break;
    }

    let summary = if fragments.is_empty() {
        format!("No prior context found for {}.", scope)
    } else {
        format!(
            "Restored {} fragment{} from {} (~{} tokens).",
            fragments.len(),
            if fragments.len() == 1 { "" } else { "s" },
            scope,
            used
        )
    };

    RestorationContext {
        has_content: !fragments.is_empty(),
        summary,
        fragments,
        estimated_tokens: used,
    }
}

fn restored(candidate: RankedFragment, max_chars: Option<usize>) -> RestoredFragment {
    let fragment = candidate.fragment;
    let (content, truncated) = match max_chars {
        Some(max) if fragment.content.chars().count() > max => {
            let keep = max.saturating_sub(ELLIPSIS.len());
            let mut cut: String = fragment.content.chars().take(keep).collect();
            cut.push_str(ELLIPSIS);
            (cut, true)
        }
        _ => (fragment.content, false),
    };

    RestoredFragment {
        id: fragment.id,
        content,
        truncated,
        score: candidate.score,
        timestamp: fragment.timestamp,
        project: fragment.project,
    }
}

/// Retrieve with [`RESTORATION_QUERY`] and assemble a budgeted context
pub fn build_restoration_context<E: Embedder + ?Sized>(
    retriever: &HybridRetriever<'_, E>,
    scope: &Scope,
    message_count: usize,
    token_budget: usize,
    now: DateTime<Utc>,
) -> Result<RestorationContext> {
    let candidates = retriever.search(
        RESTORATION_QUERY,
        scope,
        message_count.saturating_mul(2),
        now,
    )?;
    let context = assemble_restoration(candidates, scope, message_count, token_budget);
    tracing::debug!(
        fragments = context.fragments.len(),
        tokens = context.estimated_tokens,
        "Built restoration context"
    );
    Ok(context)
}
