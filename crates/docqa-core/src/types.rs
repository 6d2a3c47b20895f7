//! Domain types shared by the indexes, the ranker and the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::dates::{self, DateMention, NormalizedDate};
use crate::error::{Error, Result};

pub type ChunkId = String;
pub type DocId = String;

/// Largest `top_k` a query may request.
pub const MAX_TOP_K: usize = 10;

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl SourceMetadata {
    pub fn new(filename: impl Into<String>) -> Self {
        Self { filename: filename.into(), page: None, section: None }
    }

    /// Document id: the file name as given, extension and folders included,
    /// with `/` as the separator.
    pub fn doc_id(&self) -> DocId {
        let name = self.filename.replace('\\', "/");
        name.strip_prefix("./").unwrap_or(&name).to_string()
    }
}

impl fmt::Display for SourceMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename)?;
        if let Some(page) = self.page {
            write!(f, ", p. {page}")?;
        }
        if let Some(section) = &self.section {
            write!(f, ", {section}")?;
        }
        Ok(())
    }
}

/// Output of a `DocumentParser`: extracted text plus its metadata.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub source: SourceMetadata,
}

impl ParsedDocument {
    pub fn new(text: impl Into<String>, source: SourceMetadata) -> Self {
        Self { text: text.into(), source }
    }
}

/// An ingested document. Created once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub source: SourceMetadata,
}

/// A bounded span of a document; the atomic unit of retrieval.
///
/// - `id`: `"{doc_id}:{position}"`, unique across the database
/// - `position`: index of the chunk within its document
/// - `dates`: normalized dates found in (or carried into) the chunk
/// - `embedding`: filled in during ingestion, not persisted with the chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: DocId,
    pub position: usize,
    pub text: String,
    pub dates: BTreeSet<NormalizedDate>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn make_id(doc_id: &str, position: usize) -> ChunkId {
        format!("{doc_id}:{position}")
    }
}

/// Retrieval mode requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Auto,
    Semantic,
    Keyword,
}

impl std::str::FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "semantic" => Ok(Self::Semantic),
            "keyword" => Ok(Self::Keyword),
            other => Err(Error::InvalidConfig(format!("unknown mode '{other}'"))),
        }
    }
}

/// Answer length presets, expressed as a generation token budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ResponseLength {
    pub fn max_tokens(self) -> usize {
        match self {
            Self::Short => 200,
            Self::Medium => 400,
            Self::Long => 800,
        }
    }
}

impl std::str::FromStr for ResponseLength {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(Error::InvalidConfig(format!("unknown response length '{other}'"))),
        }
    }
}

/// How the ranker decided to serve a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryClass {
    /// A date was parsed with high confidence; exact date matches come first.
    Date,
    /// Free-form question; vector similarity only.
    Semantic,
    /// Explicit keyword mode; keyword/date index only.
    Keyword,
    /// Both indexes fused (ambiguous date in auto mode).
    Hybrid,
}

/// A question as handed to the ranker.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub date: Option<DateMention>,
    pub mode: SearchMode,
    pub top_k: usize,
    pub max_response_tokens: usize,
    pub restrict_to: Option<DocId>,
}

impl Query {
    /// Builds a query, parsing any date it mentions. Rejects `top_k` outside
    /// `1..=MAX_TOP_K`.
    pub fn new(text: impl Into<String>, mode: SearchMode, top_k: usize, max_response_tokens: usize) -> Result<Self> {
        let text = text.into();
        let date = dates::parse_query_date(&text);
        let query = Self { text, date, mode, top_k, max_response_tokens, restrict_to: None };
        query.validate()?;
        Ok(query)
    }

    /// Limits retrieval to the chunks of one document.
    pub fn restrict_to(mut self, doc_id: impl Into<DocId>) -> Self {
        self.restrict_to = Some(doc_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_top_k(self.top_k)?;
        if self.max_response_tokens == 0 {
            return Err(Error::InvalidConfig("max_response_tokens must be positive".into()));
        }
        Ok(())
    }

    /// Normalized dates the query mentions, if any.
    pub fn dates(&self) -> Vec<NormalizedDate> {
        self.date.iter().map(|m| m.date).collect()
    }

    /// Dates to look up in the date index: each query date, plus its
    /// yearless form when it has a year, so `September 6, 2024` also
    /// reaches chunks that only say `6-Sept`.
    pub fn lookup_dates(&self) -> Vec<NormalizedDate> {
        let mut out = Vec::new();
        for date in self.dates() {
            for d in [date, date.without_year()] {
                if !out.contains(&d) {
                    out.push(d);
                }
            }
        }
        out
    }
}

pub fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(Error::InvalidConfig(format!("top_k must be in 1..={MAX_TOP_K}, got {top_k}")));
    }
    Ok(())
}

/// One ranked chunk with its fused score and the signals behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    /// Fused score in `[0, 1]`.
    pub score: f32,
    pub semantic: Option<f32>,
    pub keyword: Option<f32>,
}

/// Summary counters over the whole database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: Option<usize>,
    pub dated_chunks: usize,
    pub distinct_dates: usize,
    pub vocabulary: usize,
}
