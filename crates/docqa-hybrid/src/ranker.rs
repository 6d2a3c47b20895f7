//! Retrieval policies and score fusion.
//!
//! Every policy emits fused scores in `[0, 1]`:
//!
//! - date: chunks carrying the query date score `0.8 + 0.2 * token_norm`,
//!   chunks matching only its month and day `0.5 + 0.2 * token_norm`;
//!   semantic back-fill scores `0.5 * semantic` and always follows them
//! - semantic: the vector score
//! - keyword: raw keyword score over the best raw score
//! - hybrid: weighted mean of semantic and normalized keyword scores over a
//!   candidate pool of `4 * top_k` from each index

use std::collections::{BTreeMap, HashSet};
use tracing::instrument;

use docqa_core::error::{Error, Result};
use docqa_core::types::{Query, QueryClass, RankedResult};
use docqa_text::{KeywordDateIndex, KeywordHit};
use docqa_vector::VectorIndex;

use crate::classify::classify;

/// Candidates taken from each index per requested result in hybrid mode.
const HYBRID_POOL_FACTOR: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { semantic: 0.7, keyword: 0.3 }
    }
}

impl FusionWeights {
    pub fn new(semantic: f32, keyword: f32) -> Result<Self> {
        let ok = |w: f32| w.is_finite() && w >= 0.0;
        if !ok(semantic) || !ok(keyword) || semantic + keyword <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "fusion weights must be non-negative with a positive sum, got {semantic}/{keyword}"
            )));
        }
        Ok(Self { semantic, keyword })
    }

    pub fn fuse(&self, semantic: f32, keyword: f32) -> f32 {
        (self.semantic * semantic + self.keyword * keyword) / (self.semantic + self.keyword)
    }
}

/// The indexes a ranking reads, seen at one consistent state.
pub struct RankInput<'a> {
    pub vectors: &'a VectorIndex,
    pub keywords: &'a KeywordDateIndex,
    /// Chunks outside the filter are never returned.
    pub filter: &'a dyn Fn(&str) -> bool,
    /// Embeds the query text; only called by policies that need it.
    pub embed: &'a dyn Fn(&str) -> Result<Vec<f32>>,
}

#[derive(Debug, Clone, Default)]
pub struct HybridRanker {
    weights: FusionWeights,
}

impl HybridRanker {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Ranks chunks for `query`; returns the policy used and at most
    /// `query.top_k` results, best first.
    #[instrument(level = "debug", skip_all, fields(top_k = query.top_k))]
    pub fn rank(&self, query: &Query, input: &RankInput<'_>) -> Result<(QueryClass, Vec<RankedResult>)> {
        let class = classify(query);
        let results = match class {
            QueryClass::Semantic => self.semantic(query, input)?,
            QueryClass::Keyword => self.keyword(query, input),
            QueryClass::Date => self.date(query, input)?,
            QueryClass::Hybrid => self.hybrid(query, input)?,
        };
        tracing::debug!(?class, results = results.len(), "ranked");
        Ok((class, results))
    }

    fn semantic(&self, query: &Query, input: &RankInput<'_>) -> Result<Vec<RankedResult>> {
        let vector = (input.embed)(&query.text)?;
        let hits = input.vectors.search_where(&vector, query.top_k, input.filter)?;
        Ok(hits
            .into_iter()
            .map(|h| RankedResult { chunk_id: h.chunk_id, score: h.score, semantic: Some(h.score), keyword: None })
            .collect())
    }

    fn keyword(&self, query: &Query, input: &RankInput<'_>) -> Vec<RankedResult> {
        let hits = keyword_candidates(query, input);
        let max = hits.first().map_or(0.0, KeywordHit::score);
        hits.into_iter()
            .take(query.top_k)
            .map(|h| {
                let k = normalize(h.score(), max);
                RankedResult { chunk_id: h.chunk_id, score: k, semantic: None, keyword: Some(k) }
            })
            .collect()
    }

    fn date(&self, query: &Query, input: &RankInput<'_>) -> Result<Vec<RankedResult>> {
        let tokens = input.keywords.tokenize(&query.text);
        let dates = query.lookup_dates();
        let mut primaries: Vec<KeywordHit> = dates
            .iter()
            .flat_map(|d| input.keywords.lookup_date(d))
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|id| (input.filter)(id.as_str()))
            .map(|id| input.keywords.score_chunk(&id, &tokens, &dates))
            .collect();
        primaries.sort_by(KeywordHit::date_order);
        primaries.truncate(query.top_k);

        let max_tokens = primaries.iter().map(|h| h.token_score).max().unwrap_or(0) as f32;
        let mut results: Vec<RankedResult> = primaries
            .into_iter()
            .map(|h| {
                let k = normalize(h.token_score as f32, max_tokens);
                // a chunk tagged with the full date matches every lookup key
                let floor = if h.date_matches == dates.len() { 0.8 } else { 0.5 };
                RankedResult { chunk_id: h.chunk_id, score: floor + 0.2 * k, semantic: None, keyword: Some(k) }
            })
            .collect();

        let missing = query.top_k - results.len();
        if missing > 0 {
            let taken: HashSet<String> = results.iter().map(|r| r.chunk_id.clone()).collect();
            let vector = (input.embed)(&query.text)?;
            let backfill =
                input.vectors.search_where(&vector, missing, |id| !taken.contains(id) && (input.filter)(id))?;
            results.extend(backfill.into_iter().map(|h| RankedResult {
                chunk_id: h.chunk_id,
                score: 0.5 * h.score,
                semantic: Some(h.score),
                keyword: None,
            }));
        }
        Ok(results)
    }

    fn hybrid(&self, query: &Query, input: &RankInput<'_>) -> Result<Vec<RankedResult>> {
        let pool = query.top_k * HYBRID_POOL_FACTOR;
        let vector = (input.embed)(&query.text)?;
        let semantic_hits = input.vectors.search_where(&vector, pool, input.filter)?;
        let keyword_hits: Vec<KeywordHit> = keyword_candidates(query, input).into_iter().take(pool).collect();
        let max = keyword_hits.first().map_or(0.0, KeywordHit::score);

        let tokens = input.keywords.tokenize(&query.text);
        let dates = query.lookup_dates();
        let mut candidates: BTreeMap<String, (f32, f32)> = BTreeMap::new();
        for hit in &semantic_hits {
            let raw = input.keywords.score_chunk(&hit.chunk_id, &tokens, &dates).score();
            candidates.insert(hit.chunk_id.clone(), (hit.score, normalize(raw, max)));
        }
        for hit in &keyword_hits {
            if candidates.contains_key(&hit.chunk_id) {
                continue;
            }
            let semantic = input.vectors.score(&vector, &hit.chunk_id).unwrap_or(0.0);
            candidates.insert(hit.chunk_id.clone(), (semantic, normalize(hit.score(), max)));
        }

        let mut results: Vec<RankedResult> = candidates
            .into_iter()
            .map(|(chunk_id, (s, k))| RankedResult {
                chunk_id,
                score: self.weights.fuse(s, k),
                semantic: Some(s),
                keyword: Some(k),
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        results.truncate(query.top_k);
        Ok(results)
    }
}

fn keyword_candidates(query: &Query, input: &RankInput<'_>) -> Vec<KeywordHit> {
    let tokens = input.keywords.tokenize(&query.text);
    input
        .keywords
        .lookup(&tokens, &query.lookup_dates())
        .into_iter()
        .filter(|h| (input.filter)(h.chunk_id.as_str()))
        .collect()
}

fn normalize(raw: f32, max: f32) -> f32 {
    if max > 0.0 {
        (raw / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
