//! Deterministic stand-in for the embedding model

use recollect_core::{Embedder, EmbeddingError, EmbeddingRole};

const DIMENSIONS: usize = 32;

/// Words that get a dedicated axis; everything else is hashed into the rest
const TOPICS: &[&str] = &[
    "database", "migration", "schema", "sqlite", "deploy", "release", "auth", "login", "token",
    "cache", "test", "bug", "api", "frontend", "config", "decision",
];

/// Bag-of-words embedder with fixed topic axes
///
/// Texts sharing topic words point in similar directions, so semantic
/// ranking in tests is predictable without a model download.
#[derive(Debug, Default, Clone)]
pub struct TopicEmbedder;

impl TopicEmbedder {
    pub fn new() -> Self {
        Self
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

impl Embedder for TopicEmbedder {
    fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0_f32; DIMENSIONS];
        let hashed_axes = DIMENSIONS - TOPICS.len();

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            match TOPICS.iter().position(|t| word.starts_with(t)) {
                Some(axis) => vector[axis] += 3.0,
                None => vector[TOPICS.len() + (fnv1a(&word) as usize % hashed_axes)] += 1.0,
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "topic-test"
    }
}

/// [`TopicEmbedder`] whose query embeddings always fail
///
/// Stored passages embed normally, so archiving succeeds and the first
/// retrieval afterwards errors.
#[derive(Debug, Default, Clone)]
pub struct QueryFailingEmbedder {
    inner: TopicEmbedder,
}

impl QueryFailingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Embedder for QueryFailingEmbedder {
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, EmbeddingError> {
        match role {
            EmbeddingRole::Query => Err(EmbeddingError::EmbeddingFailed(
                "query model unavailable".to_string(),
            )),
            EmbeddingRole::Passage => self.inner.embed(text, role),
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        "topic-test-query-failing"
    }
}
