use std::collections::BTreeSet;

use docqa_core::error::Result;
use docqa_core::types::{Query, QueryClass, SearchMode};
use docqa_hybrid::{FusionWeights, HybridRanker};
use docqa_hybrid::ranker::RankInput;
use docqa_text::KeywordDateIndex;
use docqa_vector::VectorIndex;

/// "a:0" is semantically identical to the query but shares no token with it;
/// "b:0" shares tokens but points the other way.
fn indexes() -> (VectorIndex, KeywordDateIndex) {
    let mut vectors = VectorIndex::new();
    vectors.add("a:0", vec![1.0, 0.0]).expect("add");
    vectors.add("b:0", vec![0.0, 1.0]).expect("add");
    let mut keywords = KeywordDateIndex::new();
    keywords.add("a:0", "casing run completed", &BTreeSet::new()).expect("add");
    keywords.add("b:0", "pump pressure spike", &BTreeSet::new()).expect("add");
    (vectors, keywords)
}

fn rank_of(ranker: &HybridRanker, query: &Query, id: &str) -> usize {
    let (vectors, keywords) = indexes();
    let embed = |_: &str| -> Result<Vec<f32>> { Ok(vec![1.0, 0.0]) };
    let accept_all = |_: &str| true;
    let input = RankInput { vectors: &vectors, keywords: &keywords, filter: &accept_all, embed: &embed };
    let (class, results) = ranker.rank(query, &input).expect("rank");
    assert_eq!(class, QueryClass::Hybrid);
    results.iter().position(|r| r.chunk_id == id).expect("ranked")
}

#[test]
fn raising_semantic_weight_never_demotes_the_semantic_match() {
    let query = Query::new("pump pressure on 6/9", SearchMode::Auto, 2, 200).expect("query");
    let mut previous = usize::MAX;
    for semantic in [0.0, 0.1, 0.3, 0.7, 1.5, 5.0] {
        let ranker = HybridRanker::new(FusionWeights::new(semantic, 0.3).expect("weights"));
        let rank = rank_of(&ranker, &query, "a:0");
        assert!(rank <= previous, "semantic_weight={semantic}: rank {rank} worse than {previous}");
        previous = rank;
    }
    assert_eq!(previous, 0, "a heavy semantic weight puts the semantic match first");
}

#[test]
fn keyword_only_weight_puts_the_token_match_first() {
    let query = Query::new("pump pressure on 6/9", SearchMode::Auto, 2, 200).expect("query");
    let ranker = HybridRanker::new(FusionWeights::new(0.0, 1.0).expect("weights"));
    assert_eq!(rank_of(&ranker, &query, "b:0"), 0);
}

#[test]
fn fused_score_is_the_weighted_mean() {
    let weights = FusionWeights::default();
    assert!((weights.fuse(1.0, 0.0) - 0.7).abs() < 1e-6);
    assert!((weights.fuse(0.0, 1.0) - 0.3).abs() < 1e-6);
    assert!((weights.fuse(1.0, 1.0) - 1.0).abs() < 1e-6);
}

#[test]
fn invalid_weights_are_rejected() {
    assert!(FusionWeights::new(0.0, 0.0).is_err());
    assert!(FusionWeights::new(-0.1, 0.5).is_err());
    assert!(FusionWeights::new(f32::NAN, 0.5).is_err());
}

#[test]
fn classification_follows_mode_and_date_confidence() {
    use docqa_hybrid::classify;
    let q = |text: &str, mode| Query::new(text, mode, 3, 200).expect("query");
    assert_eq!(classify(&q("What happened on 6-Sept?", SearchMode::Auto)), QueryClass::Date);
    assert_eq!(classify(&q("What happened on 6-9?", SearchMode::Auto)), QueryClass::Hybrid);
    assert_eq!(classify(&q("Summarize activities", SearchMode::Auto)), QueryClass::Semantic);
    assert_eq!(classify(&q("What happened on 6-Sept?", SearchMode::Semantic)), QueryClass::Semantic);
    assert_eq!(classify(&q("Summarize activities", SearchMode::Keyword)), QueryClass::Keyword);
}
