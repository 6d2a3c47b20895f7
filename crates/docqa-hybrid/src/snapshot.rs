//! Snapshot codec.
//!
//! Layout: `[json payload][magic "DQSNAP01"][blake3 hash of payload, 32 bytes]`.
//! Any failure to decode or validate is `CorruptSnapshot`; nothing partial is
//! ever returned.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use docqa_core::error::{Error, Result};
use docqa_core::types::{Chunk, Document};
use docqa_text::KeywordDateIndex;
use docqa_vector::{VectorIndex, VectorSnapshot};

use crate::database::Indexes;

const MAGIC: &[u8; 8] = b"DQSNAP01";
const HASH_LEN: usize = 32;
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PayloadRef<'a> {
    version: u32,
    documents: &'a [Document],
    chunks: Vec<&'a Chunk>,
    vectors: VectorSnapshot,
}

#[derive(Deserialize)]
struct Payload {
    version: u32,
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    vectors: VectorSnapshot,
}

pub(crate) fn encode(state: &Indexes) -> Result<Vec<u8>> {
    let payload = PayloadRef {
        version: FORMAT_VERSION,
        documents: &state.documents,
        chunks: state.chunk_order.iter().filter_map(|id| state.chunks.get(id)).collect(),
        vectors: state.vectors.snapshot(),
    };
    let body = serde_json::to_vec(&payload).map_err(|e| Error::Io(std::io::Error::other(e)))?;
    let hash = blake3::hash(&body);
    let mut out = Vec::with_capacity(body.len() + MAGIC.len() + HASH_LEN);
    out.extend_from_slice(&body);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(hash.as_bytes());
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Indexes> {
    let footer = MAGIC.len() + HASH_LEN;
    if bytes.len() < footer {
        return Err(Error::CorruptSnapshot(format!("{} bytes is too short", bytes.len())));
    }
    let (body, tail) = bytes.split_at(bytes.len() - footer);
    let (magic, stored) = tail.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(Error::CorruptSnapshot("missing snapshot footer".into()));
    }
    let computed = blake3::hash(body);
    if computed.as_bytes().as_slice() != stored {
        return Err(Error::CorruptSnapshot("checksum mismatch".into()));
    }
    let payload: Payload = serde_json::from_slice(body).map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
    if payload.version != FORMAT_VERSION {
        return Err(Error::CorruptSnapshot(format!("unsupported format version {}", payload.version)));
    }
    rebuild(payload)
}

fn rebuild(payload: Payload) -> Result<Indexes> {
    let mut doc_ids = HashSet::new();
    for doc in &payload.documents {
        if !doc_ids.insert(doc.id.as_str()) {
            return Err(Error::CorruptSnapshot(format!("document {} listed twice", doc.id)));
        }
    }
    if payload.vectors.entries.len() != payload.chunks.len() {
        return Err(Error::CorruptSnapshot(format!(
            "{} chunks but {} vectors",
            payload.chunks.len(),
            payload.vectors.entries.len()
        )));
    }
    let vectors = VectorIndex::restore(payload.vectors)?;
    let mut keywords = KeywordDateIndex::new();
    let mut chunks = HashMap::with_capacity(payload.chunks.len());
    let mut chunk_order = Vec::with_capacity(payload.chunks.len());
    for chunk in payload.chunks {
        if !doc_ids.contains(chunk.doc_id.as_str()) {
            return Err(Error::CorruptSnapshot(format!("chunk {} belongs to unknown document {}", chunk.id, chunk.doc_id)));
        }
        if !vectors.contains(&chunk.id) {
            return Err(Error::CorruptSnapshot(format!("chunk {} has no vector", chunk.id)));
        }
        keywords
            .add(&chunk.id, &chunk.text, &chunk.dates)
            .map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
        chunk_order.push(chunk.id.clone());
        chunks.insert(chunk.id.clone(), chunk);
    }
    Ok(Indexes { documents: payload.documents, chunks, chunk_order, vectors, keywords })
}
