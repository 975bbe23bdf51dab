//! Context-utilization estimate from reported token usage

use serde::{Deserialize, Serialize};

use super::Transcript;

/// Token usage block attached to assistant records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Tokens occupying the context window when the turn was produced
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }
}

/// Percentage of the context window in use, from the last turn with usage
///
/// Returns 0.0 when no turn reports usage. The result is clamped to 0-100.
pub fn estimate_context_percent(transcript: &Transcript, context_window_tokens: u64) -> f64 {
    if context_window_tokens == 0 {
        return 0.0;
    }

    let Some(usage) = transcript.turns.iter().rev().find_map(|t| t.usage) else {
        return 0.0;
    };

    let percent = usage.context_tokens() as f64 / context_window_tokens as f64 * 100.0;
    percent.clamp(0.0, 100.0)
}
