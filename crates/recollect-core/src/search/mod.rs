//! Search Module
//!
//! - Keyword query sanitization for FTS5 and the substring fallback
//! - Weighted Reciprocal Rank Fusion with recency decay
//! - [`HybridRetriever`]: the full query path over the store

mod hybrid;
mod keyword;
mod retriever;

pub use hybrid::{
    rank_with_recency, recency_decay, recency_weight, reciprocal_rank_fusion, FusedCandidate,
};
pub use keyword::{escape_like, query_terms, sanitize_fts5_query};
pub use retriever::HybridRetriever;
