use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

use docqa_core::config::{Config, Settings};
use docqa_core::error::{Error, Result};
use docqa_core::traits::GenerationRequest;
use docqa_core::types::{ChunkId, Query, QueryClass, RankedResult};
use docqa_hybrid::Database;

use crate::context::{build_context, Context};
use crate::fallback::{FallbackChain, ProviderFailure};
use crate::prompt::{self, CONTINUATION_TOKENS, NOT_FOUND, NO_DOCUMENTS};
use crate::providers::build_chain;
use crate::session::{HistoryEntry, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnswerStatus {
    Generated,
    /// Every provider failed; the text is empty but citations are kept.
    GenerationFailed,
    NoDocuments,
    NoContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// The `[n]` used in the prompt and answer.
    pub marker: usize,
    pub chunk_id: ChunkId,
    /// Human-readable source, e.g. `report.pdf, p. 3`.
    pub locator: String,
    pub score: f32,
}

#[derive(Debug)]
pub struct Answer {
    pub query: String,
    pub text: String,
    pub status: AnswerStatus,
    pub citations: Vec<Citation>,
    pub results: Vec<RankedResult>,
    pub query_class: Option<QueryClass>,
    pub provider: Option<String>,
    pub failures: Vec<ProviderFailure>,
    /// The entry recorded in the session for this answer.
    pub history: HistoryEntry,
}

pub struct Orchestrator {
    chain: FallbackChain,
    context_budget: usize,
    continue_truncated: bool,
}

impl Orchestrator {
    pub fn new(chain: FallbackChain, settings: &Settings) -> Self {
        Self { chain, context_budget: settings.context_budget, continue_truncated: settings.continue_truncated }
    }

    /// Builds the provider chain named by `rag.provider_order`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?;
        let providers = build_chain(config, &settings)?;
        let chain = FallbackChain::new(providers, Duration::from_secs(settings.provider_timeout_secs))?;
        Ok(Self::new(chain, &settings))
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Answers one question and records it in `session`.
    ///
    /// Provider failures do not make this fail: they produce an answer with
    /// [`AnswerStatus::GenerationFailed`]. Errors are returned for invalid
    /// queries and for retrieval failures other than an empty database.
    #[instrument(skip_all, fields(top_k = query.top_k, mode = ?query.mode))]
    pub fn answer(&self, db: &Database, session: &mut Session, query: &Query) -> Result<Answer> {
        query.validate()?;
        let retrieval = match db.search_and_retrieve(query) {
            Ok(retrieval) => retrieval,
            Err(Error::IndexEmpty) => {
                let draft = Draft::without_generation(None, NO_DOCUMENTS, AnswerStatus::NoDocuments);
                return Ok(record(session, query, &Context::default(), draft));
            }
            Err(e) => return Err(e),
        };
        if retrieval.chunks.is_empty() {
            let draft = Draft::without_generation(Some(retrieval.class), NOT_FOUND, AnswerStatus::NoContext);
            return Ok(record(session, query, &Context::default(), draft));
        }

        let (class, results) = (retrieval.class, retrieval.results());
        let context = build_context(retrieval.chunks, self.context_budget);
        let prompt = match (class, query.date.as_ref()) {
            (QueryClass::Date, Some(mention)) => prompt::date_prompt(&query.text, &mention.date, &context),
            _ => prompt::general_prompt(&query.text, &context),
        };
        let mut generation = self.chain.generate(&GenerationRequest::new(prompt, query.max_response_tokens));
        if generation.succeeded() && self.continue_truncated && prompt::looks_truncated(&generation.text) {
            let request = GenerationRequest::new(prompt::continuation_prompt(&query.text, &generation.text), CONTINUATION_TOKENS);
            let more = self.chain.generate(&request);
            if more.succeeded() {
                tracing::debug!(provider = ?more.provider, "appended continuation");
                generation.text = format!("{} {}", generation.text.trim_end(), more.text.trim_start());
            }
        }
        let status = if generation.succeeded() { AnswerStatus::Generated } else { AnswerStatus::GenerationFailed };
        let draft = Draft {
            query_class: Some(class),
            results,
            text: generation.text,
            status,
            provider: generation.provider,
            failures: generation.failures,
        };
        Ok(record(session, query, &context, draft))
    }
}

/// Everything about an answer except what is derived from the context.
struct Draft {
    query_class: Option<QueryClass>,
    results: Vec<RankedResult>,
    text: String,
    status: AnswerStatus,
    provider: Option<String>,
    failures: Vec<ProviderFailure>,
}

impl Draft {
    fn without_generation(query_class: Option<QueryClass>, text: &str, status: AnswerStatus) -> Self {
        Self { query_class, results: Vec::new(), text: text.to_string(), status, provider: None, failures: Vec::new() }
    }
}

fn record(session: &mut Session, query: &Query, context: &Context, draft: Draft) -> Answer {
    let Draft { query_class, results, text, status, provider, failures } = draft;
    let citations: Vec<Citation> = context
        .entries
        .iter()
        .map(|e| Citation {
            marker: e.marker,
            chunk_id: e.retrieved.chunk.id.clone(),
            locator: e.retrieved.source.to_string(),
            score: e.retrieved.result.score,
        })
        .collect();
    let history = HistoryEntry {
        query: query.text.clone(),
        answer: text.clone(),
        chunk_ids: citations.iter().map(|c| c.chunk_id.clone()).collect(),
        provider: provider.clone(),
    };
    session.push(history.clone());
    tracing::info!(?status, citations = citations.len(), provider = ?provider, "answered");
    Answer { query: query.text.clone(), text, status, citations, results, query_class, provider, failures, history }
}
