//! Chunk quality filter
//!
//! Rules are applied in order and the first one that fires decides:
//! too short, then low-information, then the valuable-signal check.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

use super::Chunk;

/// Minimum whitespace-delimited words for a chunk without a valuable signal
pub const MIN_WORDS_WITHOUT_SIGNAL: usize = 10;

static LOW_INFORMATION: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // acknowledgements
        r"(?i)^(?:(?:ok|okay|sure|thanks|thank you|got it|sounds good|great|perfect|understood|will do|done|noted|alright|absolutely|certainly|of course|no problem|you're welcome)[\s,.!]*)+$",
        // single yes/no
        r"(?i)^(?:yes|no|yep|nope|yeah|nah)[\s.!]*$",
        // pure digits
        r"^[\d\s.,:%+\-]+$",
        // pure punctuation
        r"^[\p{P}\p{S}\s]+$",
    ])
    .expect("low-information patterns are valid")
});

static VALUABLE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // code constructs
        r"\b(?:fn|function|class|struct|enum|impl|trait|def|const|let|var|return|import|export|async|await|interface|module|SELECT|INSERT|CREATE TABLE)\b",
        // reasoning connectives
        r"(?i)\b(?:because|therefore|however|instead|since|so that|in order to|as a result|which means|trade-?off|the reason)\b",
        // change verbs
        r"(?i)\b(?:implemented|fixed|added|removed|refactored|updated|created|changed|renamed|migrated|replaced|deleted|resolved|configured)\b",
        // code fence
        r"```",
    ])
    .expect("valuable-signal patterns are valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Why a chunk was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    TooShort,
    LowInformation,
    NotValuable,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::TooShort => "too_short",
            DiscardReason::LowInformation => "low_information",
            DiscardReason::NotValuable => "not_valuable",
        }
    }
}

/// Discard counts by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardCounts {
    pub too_short: usize,
    pub low_information: usize,
    pub not_valuable: usize,
}

impl DiscardCounts {
    fn record(&mut self, reason: DiscardReason) {
        match reason {
            DiscardReason::TooShort => self.too_short += 1,
            DiscardReason::LowInformation => self.low_information += 1,
            DiscardReason::NotValuable => self.not_valuable += 1,
        }
    }

    /// Total discarded chunks
    pub fn total(&self) -> usize {
        self.too_short + self.low_information + self.not_valuable
    }
}

/// Chunks that survived filtering plus what was dropped
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Chunk>,
    pub discarded: DiscardCounts,
}

/// Applies the discard rules
#[derive(Debug, Clone, Copy)]
pub struct ChunkFilter {
    min_content_length: usize,
}

impl ChunkFilter {
    pub fn new(min_content_length: usize) -> Self {
        Self { min_content_length }
    }

    /// `None` when the chunk is kept, otherwise the first rule that rejects it
    pub fn evaluate(&self, text: &str) -> Option<DiscardReason> {
        let text = text.trim();

        if text.chars().count() < self.min_content_length {
            return Some(DiscardReason::TooShort);
        }
        if LOW_INFORMATION.is_match(text) {
            return Some(DiscardReason::LowInformation);
        }
        if VALUABLE.is_match(text) || word_count(text) >= MIN_WORDS_WITHOUT_SIGNAL {
            return None;
        }
        Some(DiscardReason::NotValuable)
    }

    /// Split chunks into kept ones (order preserved) and discard counts
    pub fn apply(&self, chunks: Vec<Chunk>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for chunk in chunks {
            match self.evaluate(&chunk.text) {
                None => outcome.kept.push(chunk),
                Some(reason) => outcome.discarded.record(reason),
            }
        }
        outcome
    }
}

fn word_count(text: &str) -> usize {
    WHITESPACE.split(text).filter(|w| !w.is_empty()).count()
}
