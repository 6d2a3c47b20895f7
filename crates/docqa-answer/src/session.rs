use serde::Serialize;
use std::collections::VecDeque;

use docqa_core::types::ChunkId;

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub query: String,
    pub answer: String,
    pub chunk_ids: Vec<ChunkId>,
    pub provider: Option<String>,
}

/// Chat history holding at most `limit` entries; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct Session {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl Session {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { entries: VecDeque::with_capacity(limit), limit }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
