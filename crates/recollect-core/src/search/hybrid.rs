//! Hybrid Ranking (Vector + Keyword + RRF + Recency)
//!
//! Pure functions: candidate lists in, ranked fragments out. Nothing here
//! touches storage or the embedding model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::RetrievalConfig;
use crate::memory::{Fragment, Provenance, RankedFragment, ScoredId};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ============================================================================
// FUSION
// ============================================================================

/// A fused candidate before recency weighting
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    /// Fragment id
    pub id: String,
    /// Sum of weighted reciprocal ranks
    pub fused_score: f64,
    /// Which lists contained the id
    pub provenance: Provenance,
}

/// Weighted Reciprocal Rank Fusion
///
/// Each list contributes `weight / (k + rank + 1)` per id, with `rank`
/// zero-based. Ids appearing in both lists merge into one `Hybrid` entry.
/// The result is in first-seen order (vector list first), unsorted.
pub fn reciprocal_rank_fusion(
    vector_results: &[ScoredId],
    keyword_results: &[ScoredId],
    config: &RetrievalConfig,
) -> Vec<FusedCandidate> {
    let mut fused: Vec<FusedCandidate> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    let lists = [
        (vector_results, config.vector_weight, Provenance::Vector),
        (keyword_results, config.keyword_weight, Provenance::Keyword),
    ];

    for (results, weight, source) in lists {
        for (rank, candidate) in results.iter().enumerate() {
            let contribution = weight / (config.rrf_k + rank as f64 + 1.0);
            match positions.get(&candidate.id) {
                Some(&pos) => {
                    let entry = &mut fused[pos];
                    entry.fused_score += contribution;
                    if entry.provenance != source {
                        entry.provenance = Provenance::Hybrid;
                    }
                }
                None => {
                    positions.insert(candidate.id.clone(), fused.len());
                    fused.push(FusedCandidate {
                        id: candidate.id.clone(),
                        fused_score: contribution,
                        provenance: source,
                    });
                }
            }
        }
    }

    fused
}

// ============================================================================
// RECENCY
// ============================================================================

/// Exponential recency decay: 1.0 now, 0.5 after one half-life
///
/// Timestamps in the future count as age zero.
pub fn recency_decay(timestamp: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = ((now - timestamp).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0);
    0.5_f64.powf(age_days / half_life_days)
}

/// Multiplier applied to a fused score: `floor + (1 - floor) * decay`
pub fn recency_weight(timestamp: DateTime<Utc>, now: DateTime<Utc>, config: &RetrievalConfig) -> f64 {
    let decay = recency_decay(timestamp, now, config.half_life_days);
    config.decay_floor + (1.0 - config.decay_floor) * decay
}

/// Weight fused candidates by recency and return the top `limit`
///
/// Order: final score desc, then fused score desc, then first-seen order.
/// Candidates whose fragment is missing from `fragments` are dropped.
pub fn rank_with_recency(
    fused: Vec<FusedCandidate>,
    fragments: Vec<Fragment>,
    now: DateTime<Utc>,
    config: &RetrievalConfig,
    limit: usize,
) -> Vec<RankedFragment> {
    let mut by_id: HashMap<String, Fragment> = fragments
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    let mut ranked: Vec<(usize, RankedFragment)> = fused
        .into_iter()
        .enumerate()
        .filter_map(|(order, candidate)| {
            let fragment = by_id.remove(&candidate.id)?;
            let score = candidate.fused_score * recency_weight(fragment.timestamp, now, config);
            Some((
                order,
                RankedFragment {
                    fragment,
                    score,
                    fused_score: candidate.fused_score,
                    provenance: candidate.provenance,
                },
            ))
        })
        .collect();

    ranked.sort_by(|(order_a, a), (order_b, b)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.fused_score.total_cmp(&a.fused_score))
            .then_with(|| order_a.cmp(order_b))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(_, ranked)| ranked)
        .collect()
}
