//! Hybrid retrieval over the fragment store

use chrono::{DateTime, Utc};

use super::hybrid::{rank_with_recency, reciprocal_rank_fusion};
use crate::config::RetrievalConfig;
use crate::embeddings::{Embedder, EmbeddingRole};
use crate::error::Result;
use crate::memory::{RankedFragment, Scope};
use crate::storage::Storage;

/// Runs a query through both candidate lists, fusion and recency decay
pub struct HybridRetriever<'a, E: ?Sized> {
    storage: &'a Storage,
    embedder: &'a E,
    config: &'a RetrievalConfig,
}

impl<'a, E: Embedder + ?Sized> HybridRetriever<'a, E> {
    pub fn new(storage: &'a Storage, embedder: &'a E, config: &'a RetrievalConfig) -> Self {
        Self {
            storage,
            embedder,
            config,
        }
    }

    /// Rank fragments of `scope` for `query`, best first
    ///
    /// A blank query or zero limit returns nothing without embedding.
    pub fn search(
        &self,
        query: &str,
        scope: &Scope,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedFragment>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let candidate_limit = limit.saturating_mul(self.config.candidate_multiplier);

        let query_embedding = self.embedder.embed(query, EmbeddingRole::Query)?;
        let vector = self
            .storage
            .vector_candidates(&query_embedding, scope, candidate_limit)?;
        let keyword = self
            .storage
            .keyword_candidates(query, scope, candidate_limit)?;

        let fused = reciprocal_rank_fusion(&vector, &keyword, self.config);
        let ids: Vec<String> = fused.iter().map(|c| c.id.clone()).collect();
        let fragments = self.storage.fetch_many(&ids)?;

        let ranked = rank_with_recency(fused, fragments, now, self.config, limit);
        tracing::debug!(
            query,
            scope = %scope,
            vector = vector.len(),
            keyword = keyword.len(),
            returned = ranked.len(),
            "Hybrid retrieval"
        );
        Ok(ranked)
    }
}
