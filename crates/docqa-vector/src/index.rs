use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

use docqa_core::error::{Error, Result};
use docqa_core::types::ChunkId;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: ChunkId,
    /// `(cos + 1) / 2`, in `[0, 1]`.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    chunk_id: ChunkId,
    vector: Vec<f32>,
    norm: f32,
}

/// Serializable form of a [`VectorIndex`], entries in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSnapshot {
    pub dimension: Option<usize>,
    pub entries: Vec<(ChunkId, Vec<f32>)>,
}

/// Exact (linear scan) vector index. The dimension is fixed by the first vector
/// added, or up front with [`VectorIndex::with_dimension`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    entries: Vec<Entry>,
    positions: HashMap<ChunkId, usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension: Some(dimension), ..Self::default() }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.positions.contains_key(chunk_id)
    }

    pub fn get(&self, chunk_id: &str) -> Option<&[f32]> {
        self.positions.get(chunk_id).map(|&i| self.entries[i].vector.as_slice())
    }

    /// Adds a vector. On error the index is left unchanged.
    pub fn add(&mut self, chunk_id: &str, vector: Vec<f32>) -> Result<()> {
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: vector.len() });
            }
        }
        if vector.is_empty() {
            return Err(Error::DimensionMismatch { expected: self.dimension.unwrap_or(1), actual: 0 });
        }
        if self.positions.contains_key(chunk_id) {
            return Err(Error::DuplicateChunk(chunk_id.to_string()));
        }
        self.dimension = Some(vector.len());
        self.positions.insert(chunk_id.to_string(), self.entries.len());
        let norm = l2_norm(&vector);
        self.entries.push(Entry { chunk_id: chunk_id.to_string(), vector, norm });
        Ok(())
    }

    /// Top `k` entries by cosine similarity; equal scores order by chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        self.search_where(query, k, |_| true)
    }

    /// Like [`search`](Self::search) over the entries `filter` accepts.
    #[instrument(level = "debug", skip(self, query, filter), fields(entries = self.entries.len()))]
    pub fn search_where<F>(&self, query: &[f32], k: usize, filter: F) -> Result<Vec<VectorHit>>
    where
        F: Fn(&str) -> bool,
    {
        let Some(expected) = self.dimension else { return Ok(Vec::new()) };
        if query.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: query.len() });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_norm = l2_norm(query);
        let mut hits: Vec<VectorHit> = self
            .entries
            .iter()
            .filter(|e| filter(&e.chunk_id))
            .map(|e| VectorHit { chunk_id: e.chunk_id.clone(), score: similarity(query, query_norm, e) })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        hits.truncate(k);
        Ok(hits)
    }

    /// Similarity of one stored vector to `query`, on the same scale as
    /// search scores. `None` for an unknown id or a query of the wrong size.
    pub fn score(&self, query: &[f32], chunk_id: &str) -> Option<f32> {
        if Some(query.len()) != self.dimension {
            return None;
        }
        let entry = &self.entries[*self.positions.get(chunk_id)?];
        Some(similarity(query, l2_norm(query), entry))
    }

    pub fn snapshot(&self) -> VectorSnapshot {
        VectorSnapshot {
            dimension: self.dimension,
            entries: self.entries.iter().map(|e| (e.chunk_id.clone(), e.vector.clone())).collect(),
        }
    }

    /// Rebuilds an index from a snapshot, rejecting inconsistent input with
    /// `CorruptSnapshot`.
    pub fn restore(snapshot: VectorSnapshot) -> Result<Self> {
        let mut index = match snapshot.dimension {
            Some(0) => return Err(Error::CorruptSnapshot("vector dimension is zero".into())),
            Some(dim) => Self::with_dimension(dim),
            None if snapshot.entries.is_empty() => Self::new(),
            None => return Err(Error::CorruptSnapshot("vectors present without a dimension".into())),
        };
        for (chunk_id, vector) in snapshot.entries {
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::CorruptSnapshot(format!("non-finite component in vector for {chunk_id}")));
            }
            index.add(&chunk_id, vector).map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
        }
        tracing::debug!(entries = index.len(), dimension = ?index.dimension, "vector index restored");
        Ok(index)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn similarity(query: &[f32], query_norm: f32, entry: &Entry) -> f32 {
    // a zero vector has no direction: score it as orthogonal
    if query_norm == 0.0 || entry.norm == 0.0 {
        return 0.5;
    }
    let dot: f32 = query.iter().zip(&entry.vector).map(|(a, b)| a * b).sum();
    let cos = (dot / (query_norm * entry.norm)).clamp(-1.0, 1.0);
    (cos + 1.0) / 2.0
}
