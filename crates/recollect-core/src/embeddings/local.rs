//! Local Semantic Embeddings
//!
//! Uses fastembed for local ONNX inference with Nomic Embed Text v1.5
//! (768d, truncated to 256d via Matryoshka). Nomic is trained with task
//! prefixes, which is how query and passage roles are kept apart.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{
    truncate_for_model, Embedder, EmbeddingError, EmbeddingRole, BATCH_SIZE,
    EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};

const MODEL_NAME: &str = "nomic-ai/nomic-embed-text-v1.5";

const QUERY_PREFIX: &str = "search_query: ";
const PASSAGE_PREFIX: &str = "search_document: ";

/// Get the default cache directory for fastembed models
/// Uses FASTEMBED_CACHE_PATH env var, or falls back to platform cache directory
fn default_cache_dir() -> PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return PathBuf::from(path);
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "recollect", "recollect") {
        return proj_dirs.cache_dir().join("fastembed");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/recollect/fastembed");
    }

    PathBuf::from(".fastembed_cache")
}

/// Matryoshka truncation: the first N dims ARE the N-dim representation
pub fn matryoshka_truncate(mut vector: Vec<f32>) -> Vec<f32> {
    vector.truncate(EMBEDDING_DIMENSIONS);
    vector
}

/// fastembed-backed [`Embedder`]
///
/// Owned by the invocation's `MemoryContext`; the model is loaded once in
/// [`LocalEmbedder::new`] and released when the embedder is dropped.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
}

impl LocalEmbedder {
    /// Load the model, downloading it into the cache directory on first use
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self, EmbeddingError> {
        let cache_dir = cache_dir.unwrap_or_else(default_cache_dir);
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("Failed to create cache directory {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(true)
            .with_cache_dir(cache_dir);

        let model = TextEmbedding::try_new(options).map_err(|e| {
            EmbeddingError::ModelInit(format!(
                "Failed to initialize {}: {}. \
                Ensure ONNX runtime is available and model files can be downloaded.",
                MODEL_NAME, e
            ))
        })?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }

    fn prefixed(text: &str, role: EmbeddingRole) -> String {
        let prefix = match role {
            EmbeddingRole::Query => QUERY_PREFIX,
            EmbeddingRole::Passage => PASSAGE_PREFIX,
        };
        format!("{}{}", prefix, truncate_for_model(text, MAX_TEXT_LENGTH))
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut vectors = self.embed_batch(&[text], role)?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding generated".to_string()))
    }

    fn embed_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("Lock poisoned: {}", e)))?;

        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let inputs: Vec<String> = chunk.iter().map(|t| Self::prefixed(t, role)).collect();
            let embeddings = model
                .embed(inputs, None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

            if embeddings.len() != chunk.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: chunk.len(),
                    got: embeddings.len(),
                });
            }
            all.extend(embeddings.into_iter().map(matryoshka_truncate));
        }

        Ok(all)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
