use std::collections::BTreeSet;

use docqa_core::dates::NormalizedDate;
use docqa_core::error::Error;
use docqa_text::KeywordDateIndex;

fn no_dates() -> BTreeSet<NormalizedDate> {
    BTreeSet::new()
}

fn dated(year: Option<i32>, month: u32, day: u32) -> BTreeSet<NormalizedDate> {
    BTreeSet::from([NormalizedDate::new(year, month, day).expect("valid date")])
}

#[test]
fn tokenizer_lowercases_and_drops_stopwords() {
    let index = KeywordDateIndex::new();
    assert_eq!(index.tokenize("The Mud WEIGHT was raised to 1.25"), vec!["mud", "weight", "raised", "1", "25"]);
}

#[test]
fn duplicate_chunk_is_rejected() {
    let mut index = KeywordDateIndex::new();
    index.add("a:0", "mud weight", &no_dates()).expect("first add");
    let err = index.add("a:0", "other text", &no_dates()).expect_err("duplicate");
    assert!(matches!(err, Error::DuplicateChunk(id) if id == "a:0"));
    assert_eq!(index.len(), 1);
}

#[test]
fn token_overlap_sums_term_frequencies() {
    let mut index = KeywordDateIndex::new();
    index.add("a:0", "casing casing cement", &no_dates()).expect("add");
    index.add("a:1", "casing cement cement cement", &no_dates()).expect("add");
    index.add("a:2", "drilling ahead", &no_dates()).expect("add");

    let query = index.tokenize("casing cement casing");
    let hits = index.lookup_tokens(&query);
    let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a:1", "a:0"], "a:1 scores 4, a:0 scores 3, a:2 does not match");
    assert_eq!(hits[0].token_score, 4);
    assert_eq!(hits[0].token_matches, 2);
}

#[test]
fn equal_scores_fall_back_to_ingestion_order() {
    let mut index = KeywordDateIndex::new();
    index.add("z:0", "pump pressure", &no_dates()).expect("add");
    index.add("a:0", "pump pressure", &no_dates()).expect("add");
    let hits = index.lookup_tokens(&index.tokenize("pump"));
    let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["z:0", "a:0"]);
}

#[test]
fn date_matches_break_token_ties() {
    let mut index = KeywordDateIndex::new();
    index.add("a:0", "pump pressure rose", &no_dates()).expect("add");
    index.add("a:1", "pump pressure rose", &dated(Some(2024), 9, 6)).expect("add");
    let sept6 = NormalizedDate::new(None, 9, 6).expect("date");
    let hits = index.lookup(&index.tokenize("pump"), &[sept6]);
    assert_eq!(hits[0].chunk_id, "a:1");
    assert_eq!(hits[0].date_matches, 1);
    assert!((hits[0].score() - 3.0).abs() < f32::EPSILON);
}

#[test]
fn exact_date_lookup_uses_canonical_keys() {
    let mut index = KeywordDateIndex::new();
    index.add("r:0", "spud", &dated(Some(2024), 9, 6)).expect("add");
    index.add("r:1", "drill", &dated(None, 9, 6)).expect("add");
    index.add("r:2", "trip", &dated(Some(2023), 9, 6)).expect("add");

    let yearless = NormalizedDate::new(None, 9, 6).expect("date");
    assert_eq!(index.lookup_date(&yearless), vec!["r:0", "r:1", "r:2"]);

    let full = NormalizedDate::new(Some(2024), 9, 6).expect("date");
    assert_eq!(index.lookup_date(&full), vec!["r:0"]);

    let other = NormalizedDate::new(None, 9, 7).expect("date");
    assert!(index.lookup_date(&other).is_empty());
    assert_eq!(index.distinct_dates(), 3);
}

#[test]
fn score_chunk_reports_non_matching_chunks_as_zero() {
    let mut index = KeywordDateIndex::new();
    index.add("a:0", "mud weight", &no_dates()).expect("add");
    let hit = index.score_chunk("a:0", &index.tokenize("cement"), &[]);
    assert_eq!(hit.token_score, 0);
    assert_eq!(hit.date_matches, 0);
    assert_eq!(hit.seq, 0);
}
