//! The document database: both indexes behind one lock.
//!
//! Readers always see the vector and keyword indexes at the same state.
//! Ingestion chunks and embeds documents in parallel without the lock, then
//! inserts them under the write lock in input order.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{DocumentParser, Embedder, Store};
use docqa_core::types::{Chunk, ChunkId, DocId, Document, IndexStats, ParsedDocument, Query, QueryClass, RankedResult, SourceMetadata};
use docqa_text::KeywordDateIndex;
use docqa_vector::VectorIndex;

use crate::ranker::{FusionWeights, HybridRanker, RankInput};
use crate::snapshot;
use crate::store::FileStore;

#[derive(Debug, Default)]
pub(crate) struct Indexes {
    pub(crate) documents: Vec<Document>,
    pub(crate) chunks: HashMap<ChunkId, Chunk>,
    pub(crate) chunk_order: Vec<ChunkId>,
    pub(crate) vectors: VectorIndex,
    pub(crate) keywords: KeywordDateIndex,
}

impl Indexes {
    fn has_document(&self, doc_id: &str) -> bool {
        self.documents.iter().any(|d| d.id == doc_id)
    }
}

/// A chunked and embedded document waiting to be inserted.
struct Prepared {
    document: Document,
    chunks: Vec<Chunk>,
}

#[derive(Debug)]
pub struct IngestFailure {
    /// File name of the document that failed.
    pub source: String,
    pub error: Error,
}

/// Outcome of a batch ingest. One failing document never stops the rest.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<DocId>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.ingested.extend(other.ingested);
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub class: QueryClass,
    pub results: Vec<RankedResult>,
}

/// Ranked results with their chunks, read from one index state.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub class: QueryClass,
    pub chunks: Vec<RetrievedChunk>,
}

impl Retrieval {
    pub fn results(&self) -> Vec<RankedResult> {
        self.chunks.iter().map(|c| c.result.clone()).collect()
    }
}

/// A ranked chunk together with the document it came from.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub source: SourceMetadata,
    pub result: RankedResult,
}

pub struct Database {
    state: RwLock<Indexes>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    ranker: HybridRanker,
    workers: usize,
}

impl Database {
    pub fn new(embedder: Arc<dyn Embedder>, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let weights = FusionWeights::new(settings.semantic_weight, settings.keyword_weight)?;
        Ok(Self::with_parts(embedder, Chunker::new(settings.chunking()), HybridRanker::new(weights), settings.workers))
    }

    pub fn with_parts(embedder: Arc<dyn Embedder>, chunker: Chunker, ranker: HybridRanker, workers: usize) -> Self {
        Self { state: RwLock::new(Indexes::default()), embedder, chunker, ranker, workers: workers.max(1) }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Chunks, embeds and indexes one document; returns its id.
    #[instrument(skip_all, fields(file = %doc.source.filename))]
    pub fn ingest(&self, doc: ParsedDocument) -> Result<DocId> {
        let prepared = self.prepare(doc)?;
        let mut state = self.state.write();
        commit(&mut state, prepared)
    }

    pub fn ingest_batch(&self, docs: Vec<ParsedDocument>) -> Result<IngestReport> {
        self.ingest_batch_with(docs, |_| {})
    }

    /// Like [`ingest_batch`](Self::ingest_batch), calling `on_prepared` with
    /// each file name once its chunks are embedded.
    #[instrument(skip_all, fields(docs = docs.len(), workers = self.workers))]
    pub fn ingest_batch_with<F>(&self, docs: Vec<ParsedDocument>, on_prepared: F) -> Result<IngestReport>
    where
        F: Fn(&str) + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("ingest worker pool: {e}")))?;
        let prepared: Vec<(String, Result<Prepared>)> = pool.install(|| {
            docs.into_par_iter()
                .map(|doc| {
                    let source = doc.source.filename.clone();
                    let result = self.prepare(doc);
                    on_prepared(&source);
                    (source, result)
                })
                .collect()
        });

        let mut report = IngestReport::default();
        let mut state = self.state.write();
        for (source, result) in prepared {
            match result.and_then(|p| commit(&mut state, p)) {
                Ok(doc_id) => report.ingested.push(doc_id),
                Err(error) => {
                    tracing::warn!(%source, %error, "document not ingested");
                    report.failed.push(IngestFailure { source, error });
                }
            }
        }
        drop(state);
        tracing::info!(ingested = report.ingested.len(), failed = report.failed.len(), "batch ingested");
        Ok(report)
    }

    /// Reads and parses each file with `parser`, then ingests the batch.
    /// Each document is named by its path relative to `root`, so files with
    /// the same name in different folders stay distinct. Unreadable or
    /// unparseable files are reported as failures.
    pub fn ingest_files<F>(
        &self,
        root: &Path,
        paths: &[impl AsRef<Path>],
        parser: &dyn DocumentParser,
        on_prepared: F,
    ) -> Result<IngestReport>
    where
        F: Fn(&str) + Sync,
    {
        let mut report = IngestReport::default();
        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let name = relative_name(root, path);
            let parsed = std::fs::read(path)
                .map_err(Error::from)
                .and_then(|bytes| parser.parse(&name, &bytes).map_err(|e| Error::Document(format!("{name}: {e:#}"))));
            match parsed {
                Ok(doc) => docs.push(doc),
                Err(error) => {
                    tracing::warn!(file = %path.display(), %error, "skipping file");
                    on_prepared(&name);
                    report.failed.push(IngestFailure { source: name, error });
                }
            }
        }
        report.merge(self.ingest_batch_with(docs, on_prepared)?);
        Ok(report)
    }

    fn prepare(&self, doc: ParsedDocument) -> Result<Prepared> {
        let ParsedDocument { text, source } = doc;
        if text.trim().is_empty() {
            return Err(Error::Document(format!("{}: no text", source.filename)));
        }
        let doc_id = source.doc_id();
        let mut chunks = self.chunker.chunk(&doc_id, &text);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).map_err(|e| Error::Embedding(format!("{e:#}")))?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!("{} vectors for {} chunks", vectors.len(), chunks.len())));
        }
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            if vector.len() != self.embedder.dim() {
                return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: vector.len() });
            }
            chunk.embedding = Some(vector);
        }
        tracing::debug!(%doc_id, chunks = chunks.len(), "document prepared");
        Ok(Prepared { document: Document { id: doc_id, source }, chunks })
    }

    /// Ranks chunks for `query`. Fails with `InvalidConfig` before touching
    /// the indexes when the query is malformed, and with `IndexEmpty` when
    /// nothing has been ingested.
    #[instrument(skip_all, fields(mode = ?query.mode, top_k = query.top_k))]
    pub fn search(&self, query: &Query) -> Result<SearchOutcome> {
        query.validate()?;
        let state = self.state.read();
        self.rank(&state, query)
    }

    /// Ranks chunks for `query` and looks them up under the same read lock,
    /// so every result resolves even while a load or ingest is waiting.
    /// Fails like [`search`](Self::search).
    #[instrument(skip_all, fields(mode = ?query.mode, top_k = query.top_k))]
    pub fn search_and_retrieve(&self, query: &Query) -> Result<Retrieval> {
        query.validate()?;
        let state = self.state.read();
        let SearchOutcome { class, results } = self.rank(&state, query)?;
        Ok(Retrieval { class, chunks: materialize(&state, &results) })
    }

    fn rank(&self, state: &Indexes, query: &Query) -> Result<SearchOutcome> {
        if state.chunks.is_empty() {
            return Err(Error::IndexEmpty);
        }
        let restrict = query.restrict_to.as_deref();
        if let Some(doc_id) = restrict {
            if !state.has_document(doc_id) {
                return Err(Error::NotFound(format!("document {doc_id}")));
            }
        }
        let filter = |id: &str| match restrict {
            Some(doc_id) => state.chunks.get(id).is_some_and(|c| c.doc_id == doc_id),
            None => true,
        };
        let embed = |text: &str| self.embedder.embed(text).map_err(|e| Error::Embedding(format!("{e:#}")));
        let input = RankInput { vectors: &state.vectors, keywords: &state.keywords, filter: &filter, embed: &embed };
        let (class, results) = self.ranker.rank(query, &input)?;
        Ok(SearchOutcome { class, results })
    }

    /// Looks up the chunks and sources behind ranked results, in order.
    /// Ids no longer in the database are skipped.
    pub fn retrieve(&self, results: &[RankedResult]) -> Vec<RetrievedChunk> {
        materialize(&self.state.read(), results)
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<Chunk> {
        self.state.read().chunks.get(chunk_id).cloned()
    }

    pub fn document(&self, doc_id: &str) -> Option<Document> {
        self.state.read().documents.iter().find(|d| d.id == doc_id).cloned()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state.read().documents.clone()
    }

    /// Chunk ids in ingestion order.
    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.state.read().chunk_order.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().chunks.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        let dated: Vec<&Chunk> = state.chunks.values().filter(|c| !c.dates.is_empty()).collect();
        let distinct: BTreeSet<_> = dated.iter().flat_map(|c| c.dates.iter()).collect();
        IndexStats {
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            dimension: state.vectors.dimension(),
            dated_chunks: dated.len(),
            distinct_dates: distinct.len(),
            vocabulary: state.keywords.vocabulary_len(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_to(&FileStore::new(path.as_ref()))
    }

    /// Writes a snapshot. Holds the read lock while encoding, so ingestion
    /// waits and searches continue.
    #[instrument(skip_all)]
    pub fn save_to(&self, store: &dyn Store) -> Result<()> {
        let state = self.state.read();
        let bytes = snapshot::encode(&state)?;
        store.write(&bytes).map_err(|e| Error::Io(std::io::Error::other(format!("{e:#}"))))?;
        tracing::info!(documents = state.documents.len(), chunks = state.chunks.len(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        self.load_from(&FileStore::new(path.as_ref()))
    }

    /// Replaces the whole state with a snapshot. The snapshot is decoded and
    /// validated first; on any error the current state is kept.
    #[instrument(skip_all)]
    pub fn load_from(&self, store: &dyn Store) -> Result<()> {
        let bytes = store.read().map_err(|e| Error::Io(std::io::Error::other(format!("{e:#}"))))?;
        let loaded = snapshot::decode(&bytes)?;
        if let Some(dim) = loaded.vectors.dimension() {
            if dim != self.embedder.dim() {
                return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: dim });
            }
        }
        let (documents, chunks) = (loaded.documents.len(), loaded.chunks.len());
        *self.state.write() = loaded;
        tracing::info!(documents, chunks, "snapshot loaded");
        Ok(())
    }
}

fn materialize(state: &Indexes, results: &[RankedResult]) -> Vec<RetrievedChunk> {
    results
        .iter()
        .filter_map(|r| {
            let chunk = state.chunks.get(&r.chunk_id)?;
            let doc = state.documents.iter().find(|d| d.id == chunk.doc_id)?;
            Some(RetrievedChunk { chunk: chunk.clone(), source: doc.source.clone(), result: r.clone() })
        })
        .collect()
}

/// `path` relative to `root` with `/` separators, or its file name when it
/// lies outside `root`.
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path.file_name().map_or(path, Path::new),
    };
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Inserts a prepared document. Everything is checked before the first
/// insert, so a rejected document leaves no trace.
fn commit(state: &mut Indexes, prepared: Prepared) -> Result<DocId> {
    let Prepared { document, chunks } = prepared;
    if state.has_document(&document.id) {
        return Err(Error::DuplicateDocument(document.id));
    }
    let mut expected = state.vectors.dimension();
    for chunk in &chunks {
        if state.chunks.contains_key(&chunk.id) {
            return Err(Error::DuplicateChunk(chunk.id.clone()));
        }
        let actual = chunk.embedding.as_ref().map_or(0, Vec::len);
        if actual == 0 {
            return Err(Error::Embedding(format!("chunk {} has no embedding", chunk.id)));
        }
        match expected {
            Some(dim) if dim != actual => return Err(Error::DimensionMismatch { expected: dim, actual }),
            _ => expected = Some(actual),
        }
    }
    for mut chunk in chunks {
        let vector = chunk.embedding.take().unwrap_or_default();
        state.vectors.add(&chunk.id, vector)?;
        state.keywords.add(&chunk.id, &chunk.text, &chunk.dates)?;
        state.chunk_order.push(chunk.id.clone());
        state.chunks.insert(chunk.id.clone(), chunk);
    }
    let doc_id = document.id.clone();
    tracing::info!(%doc_id, chunks = state.chunks.len(), "document indexed");
    state.documents.push(document);
    Ok(doc_id)
}
