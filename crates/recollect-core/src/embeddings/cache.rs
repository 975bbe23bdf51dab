//! Query embedding cache
//!
//! Restoration and search can issue the same query more than once per
//! invocation; query-role vectors are memoised, passages never are.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::{Embedder, EmbeddingError, EmbeddingRole};

/// Default number of cached query vectors
const DEFAULT_CAPACITY: usize = 100;

/// [`Embedder`] wrapper that caches query-role embeddings
pub struct QueryCache<E> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl<E: Embedder> QueryCache<E> {
    /// Wrap an embedder with the default capacity
    pub fn new(inner: E) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    /// Wrap an embedder with a custom capacity (minimum 1)
    pub fn with_capacity(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The wrapped embedder
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Embedder> Embedder for QueryCache<E> {
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError> {
        if role == EmbeddingRole::Passage {
            return self.inner.embed(text, role);
        }

        if let Ok(mut cache) = self.cache.lock()
            && let Some(hit) = cache.get(text)
        {
            return Ok(hit.clone());
        }

        let vector = self.inner.embed(text, role)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    fn embed_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match role {
            EmbeddingRole::Passage => self.inner.embed_batch(texts, role),
            EmbeddingRole::Query => texts.iter().map(|t| self.embed(t, role)).collect(),
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
