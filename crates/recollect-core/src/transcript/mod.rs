//! Transcript ingestion
//!
//! Turns a conversation transcript into candidate fragments:
//!
//! - [`parse_transcript`]: JSONL / JSON-array records to typed turns
//! - [`chunk_transcript`]: paragraph and sentence chunking of assistant turns
//! - [`ChunkFilter`]: discard rules for noise
//! - [`estimate_context_percent`]: context utilization from token usage

mod chunker;
mod filter;
mod parser;
mod usage;

use std::path::PathBuf;

pub use chunker::{chunk_text, chunk_transcript, Chunk};
pub use filter::{ChunkFilter, DiscardCounts, DiscardReason, FilterOutcome, MIN_WORDS_WITHOUT_SIGNAL};
pub use parser::{
    detect_shape, parse_transcript, parse_transcript_bytes, parse_transcript_str, RecordShape,
    Role, Transcript, Turn,
};
pub use usage::{estimate_context_percent, TokenUsage};

use crate::config::Config;

/// Transcript error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    /// The transcript file could not be read
    #[error("Failed to read transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Chunks that survived filtering, with the discard breakdown
///
/// Runs chunking and filtering with the sizes and minimum length from
/// `config`.
pub fn extract_candidates(transcript: &Transcript, config: &Config) -> FilterOutcome {
    let chunks = chunk_transcript(transcript, &config.chunking);
    ChunkFilter::new(config.min_content_length).apply(chunks)
}
