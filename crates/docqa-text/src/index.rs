//! Token and date postings over chunks.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use docqa_core::dates::NormalizedDate;
use docqa_core::error::{Error, Result};
use docqa_core::types::ChunkId;

use crate::analyzer::Analyzer;

/// Weight of one exact date match relative to one unit of token overlap.
pub const DATE_MATCH_WEIGHT: f32 = 2.0;

/// A chunk matched by a keyword/date lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
	pub chunk_id: ChunkId,
	/// Sum of the chunk's term frequencies over the distinct query tokens.
	pub token_score: u32,
	/// Number of distinct query tokens present in the chunk.
	pub token_matches: usize,
	/// Number of query dates the chunk carries.
	pub date_matches: usize,
	/// Ingestion sequence number; lower was added earlier.
	pub seq: u64,
}

impl KeywordHit {
	/// Raw keyword score: token overlap plus weighted date matches.
	pub fn score(&self) -> f32 {
		self.token_score as f32 + DATE_MATCH_WEIGHT * self.date_matches as f32
	}

	/// Orders exact-date candidates: more date matches, then more token
	/// overlap, then earlier ingestion.
	pub fn date_order(a: &Self, b: &Self) -> Ordering {
		b.date_matches
			.cmp(&a.date_matches)
			.then(b.token_score.cmp(&a.token_score))
			.then(b.token_matches.cmp(&a.token_matches))
			.then(a.seq.cmp(&b.seq))
	}

	/// Orders by raw score, breaking ties by date matches, distinct token
	/// matches, then ingestion order.
	pub fn score_order(a: &Self, b: &Self) -> Ordering {
		b.score()
			.total_cmp(&a.score())
			.then(b.date_matches.cmp(&a.date_matches))
			.then(b.token_matches.cmp(&a.token_matches))
			.then(a.seq.cmp(&b.seq))
	}
}

#[derive(Debug, Default)]
pub struct KeywordDateIndex {
	analyzer: Analyzer,
	tokens: HashMap<String, HashMap<ChunkId, u32>>,
	dates: HashMap<String, HashSet<ChunkId>>,
	chunk_dates: HashMap<ChunkId, BTreeSet<NormalizedDate>>,
	order: HashMap<ChunkId, u64>,
	next_seq: u64,
}

impl KeywordDateIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Indexes a chunk's tokens and dates. A chunk id can be added once.
	pub fn add(&mut self, chunk_id: &str, text: &str, dates: &BTreeSet<NormalizedDate>) -> Result<()> {
		if self.order.contains_key(chunk_id) {
			return Err(Error::DuplicateChunk(chunk_id.to_string()));
		}
		let terms = self.analyzer.tokens(text);
		for term in terms {
			*self.tokens.entry(term).or_default().entry(chunk_id.to_string()).or_insert(0) += 1;
		}
		for date in dates {
			for key in date.index_keys() {
				self.dates.entry(key).or_default().insert(chunk_id.to_string());
			}
		}
		self.chunk_dates.insert(chunk_id.to_string(), dates.clone());
		self.order.insert(chunk_id.to_string(), self.next_seq);
		self.next_seq += 1;
		Ok(())
	}

	pub fn tokenize(&self, text: &str) -> Vec<String> {
		self.analyzer.tokens(text)
	}

	/// Chunks carrying `date`, as a set. A yearless date also finds chunks
	/// whose date has a year.
	pub fn date_set(&self, date: &NormalizedDate) -> Option<&HashSet<ChunkId>> {
		self.dates.get(&date.key())
	}

	/// Chunks carrying `date`, in ingestion order.
	pub fn lookup_date(&self, date: &NormalizedDate) -> Vec<ChunkId> {
		let mut ids: Vec<&ChunkId> = self.date_set(date).map(|s| s.iter().collect()).unwrap_or_default();
		ids.sort_by_key(|id| self.seq(id));
		ids.into_iter().cloned().collect()
	}

	/// Chunks sharing at least one token with the query, by token overlap.
	pub fn lookup_tokens(&self, tokens: &[String]) -> Vec<KeywordHit> {
		self.lookup(tokens, &[])
	}

	/// Chunks matching any query token or any query date, ordered by
	/// [`KeywordHit::score_order`].
	pub fn lookup(&self, tokens: &[String], dates: &[NormalizedDate]) -> Vec<KeywordHit> {
		let mut hits: HashMap<&str, KeywordHit> = HashMap::new();
		let distinct: BTreeSet<&String> = tokens.iter().collect();
		for token in distinct {
			let Some(postings) = self.tokens.get(token) else { continue };
			for (id, tf) in postings {
				let hit = hits.entry(id.as_str()).or_insert_with(|| self.empty_hit(id));
				hit.token_score += tf;
				hit.token_matches += 1;
			}
		}
		let distinct_dates: BTreeSet<&NormalizedDate> = dates.iter().collect();
		for date in distinct_dates {
			let Some(ids) = self.date_set(date) else { continue };
			for id in ids {
				let hit = hits.entry(id.as_str()).or_insert_with(|| self.empty_hit(id));
				hit.date_matches += 1;
			}
		}
		let mut out: Vec<KeywordHit> = hits.into_values().collect();
		out.sort_by(KeywordHit::score_order);
		tracing::debug!(tokens = tokens.len(), dates = dates.len(), hits = out.len(), "keyword lookup");
		out
	}

	/// Scores one chunk against the query, whether or not it matches.
	pub fn score_chunk(&self, chunk_id: &str, tokens: &[String], dates: &[NormalizedDate]) -> KeywordHit {
		let mut hit = self.empty_hit(chunk_id);
		let distinct: BTreeSet<&String> = tokens.iter().collect();
		for token in distinct {
			if let Some(tf) = self.tokens.get(token).and_then(|p| p.get(chunk_id)) {
				hit.token_score += tf;
				hit.token_matches += 1;
			}
		}
		let distinct_dates: BTreeSet<&NormalizedDate> = dates.iter().collect();
		hit.date_matches = distinct_dates
			.into_iter()
			.filter(|d| self.date_set(d).is_some_and(|s| s.contains(chunk_id)))
			.count();
		hit
	}

	pub fn chunk_dates(&self, chunk_id: &str) -> Option<&BTreeSet<NormalizedDate>> {
		self.chunk_dates.get(chunk_id)
	}

	pub fn contains(&self, chunk_id: &str) -> bool {
		self.order.contains_key(chunk_id)
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn vocabulary_len(&self) -> usize {
		self.tokens.len()
	}

	/// Distinct canonical date keys, yearless forms included.
	pub fn distinct_dates(&self) -> usize {
		self.dates.len()
	}

	fn seq(&self, chunk_id: &str) -> u64 {
		self.order.get(chunk_id).copied().unwrap_or(u64::MAX)
	}

	fn empty_hit(&self, chunk_id: &str) -> KeywordHit {
		KeywordHit { chunk_id: chunk_id.to_string(), token_score: 0, token_matches: 0, date_matches: 0, seq: self.seq(chunk_id) }
	}
}
