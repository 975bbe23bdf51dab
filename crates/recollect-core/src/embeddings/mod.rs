//! Semantic Embeddings Module
//!
//! The embedding model is an external collaborator behind the [`Embedder`]
//! trait: text plus a role tag in, fixed-length vector out. Queries and stored
//! passages are encoded with different roles (asymmetric embedding).
//!
//! - [`LocalEmbedder`]: local ONNX inference via fastembed (`embeddings` feature)
//! - [`QueryCache`]: LRU memoisation of query-role embeddings
//! - Vector helpers: cosine similarity and BLOB encoding

mod cache;
#[cfg(feature = "embeddings")]
mod local;

pub use cache::QueryCache;
#[cfg(feature = "embeddings")]
pub use local::{matryoshka_truncate, LocalEmbedder};

use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Embedding dimensions of the default model after Matryoshka truncation
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Batch size for archive-time embedding
pub const BATCH_SIZE: usize = 32;

/// Maximum text length (bytes) passed to the model
pub const MAX_TEXT_LENGTH: usize = 8192;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error types
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum EmbeddingError {
    /// Failed to initialize the embedding model
    ModelInit(String),
    /// Failed to generate embedding
    EmbeddingFailed(String),
    /// Invalid input (empty, too long, etc.)
    InvalidInput(String),
    /// Model returned a different number of vectors than inputs
    CountMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingError::ModelInit(e) => write!(f, "Model initialization failed: {}", e),
            EmbeddingError::EmbeddingFailed(e) => write!(f, "Embedding generation failed: {}", e),
            EmbeddingError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            EmbeddingError::CountMismatch { expected, got } => {
                write!(f, "Expected {} embeddings, model returned {}", expected, got)
            }
        }
    }
}

impl std::error::Error for EmbeddingError {}

// ============================================================================
// EMBEDDER
// ============================================================================

/// Encoding role of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingRole {
    /// A search query
    Query,
    /// Stored content
    Passage,
}

/// Maps text to a fixed-dimension vector
///
/// Implementations must be deterministic for identical input within a model
/// version, and `embed_batch` must return exactly one vector per input in
/// input order.
pub trait Embedder {
    /// Embed a single text
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, preserving order
    fn embed_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t, role)).collect()
    }

    /// Output dimension
    fn dimensions(&self) -> usize;

    /// Model identifier, for diagnostics
    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text, role)
    }

    fn embed_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts, role)
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

// ============================================================================
// VECTOR HELPERS
// ============================================================================

/// Cosine similarity of two vectors (0.0 for mismatched or zero vectors)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Encode a vector as little-endian f32 bytes for BLOB storage
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vector_to_bytes`]
pub fn vector_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Truncate text to at most `max_bytes` on a char boundary
pub(crate) fn truncate_for_model(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
