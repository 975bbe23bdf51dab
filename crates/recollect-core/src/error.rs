//! Crate-level error type

use crate::automation::StateError;
use crate::config::ConfigError;
use crate::embeddings::EmbeddingError;
use crate::storage::StorageError;
use crate::transcript::TranscriptError;

/// Any failure surfaced by a core operation
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage engine failure
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Embedding model failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Transcript could not be read
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Auto-save state file failure
    #[error(transparent)]
    State(#[from] StateError),
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
