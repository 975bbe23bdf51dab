//! # Recollect Core
//!
//! Long-term memory for AI conversations. Transcripts are cut into
//! fragments, filtered for value, deduplicated by content fingerprint and
//! stored with an embedding so they can be recalled later.
//!
//! - **Fragment Store**: SQLite with FTS5, content-fingerprint deduplication
//! - **Archive Pipeline**: parse → chunk → filter → embed → insert, all-or-nothing
//! - **Hybrid Retrieval**: weighted RRF over vector and keyword rankings,
//!   multiplied by an exponential recency decay
//! - **Automation**: threshold-driven auto-save / auto-clear with a
//!   token-budgeted restoration context
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recollect_core::{ArchiveTarget, Config, MemoryContext, Scope};
//!
//! let ctx = MemoryContext::open_default(Config::load(None)?)?;
//!
//! // Archive a transcript
//! let report = ctx.archive(path, &ArchiveTarget::default(), &mut |_| {})?;
//!
//! // Recall
//! let hits = ctx.search("database migration", &Scope::All, 10)?;
//!
//! // Commit
//! ctx.close()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation with fastembed
//! - `bundled-sqlite` (default): statically linked SQLite
//! - `encryption`: SQLCipher, keyed by `RECOLLECT_ENCRYPTION_KEY`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod archive;
pub mod automation;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod memory;
pub mod search;
pub mod storage;
pub mod transcript;

#[cfg(test)]
mod test_support;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use archive::{archive_parsed, archive_transcript, ArchiveProgress, ArchiveReport, ArchiveTarget};

pub use automation::{
    assemble_restoration, build_restoration_context, run_automation, should_auto_clear,
    should_auto_save, AutoSaveState, AutomationAction, AutomationReport, AutomationRequest,
    RestorationContext, RestoredFragment, StateError, StateStore,
};

pub use config::{ChunkingConfig, Config, ConfigError, RetrievalConfig};

pub use context::MemoryContext;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingRole, QueryCache};
#[cfg(feature = "embeddings")]
pub use embeddings::LocalEmbedder;

pub use error::{Error, Result};

pub use memory::{
    fingerprint, Fragment, FragmentDraft, InsertOutcome, Provenance, RankedFragment, Scope,
    ScoredId, StoreStats,
};

pub use search::{reciprocal_rank_fusion, rank_with_recency, FusedCandidate, HybridRetriever};

pub use storage::{SavePointRecord, SessionRecord, Storage, StorageError};

pub use transcript::{
    chunk_transcript, estimate_context_percent, extract_candidates, parse_transcript, Chunk,
    ChunkFilter, DiscardCounts, DiscardReason, Transcript, TranscriptError,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
