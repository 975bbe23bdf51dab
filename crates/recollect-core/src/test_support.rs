//! Deterministic embedder for unit tests

use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::embeddings::{Embedder, EmbeddingError, EmbeddingRole};

pub const TEST_DIMENSIONS: usize = 64;

/// Bag-of-words hashing embedder: texts sharing words get similar vectors
#[derive(Default)]
pub struct HashingEmbedder {
    calls: Cell<usize>,
    fail: bool,
}

impl HashingEmbedder {
    /// An embedder whose every call fails
    pub fn failing() -> Self {
        Self {
            calls: Cell::new(0),
            fail: true,
        }
    }

    /// Number of `embed` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(EmbeddingError::EmbeddingFailed("test failure".to_string()));
        }

        let mut vector = vec![0.0_f32; TEST_DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
            vector[(h >> 1) as usize % TEST_DIMENSIONS] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        TEST_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "hashing-test"
    }
}
