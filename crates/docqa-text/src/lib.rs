//! docqa-text
//!
//! In-memory keyword and date index. Text is tokenized with a tantivy
//! analyzer (simple tokenizer, lowercasing, English stopwords); dates are
//! looked up by their canonical key.

pub mod analyzer;
pub mod index;

pub use analyzer::Analyzer;
pub use index::{KeywordDateIndex, KeywordHit, DATE_MATCH_WEIGHT};
