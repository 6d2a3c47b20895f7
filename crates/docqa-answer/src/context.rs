//! Context assembly.
//!
//! Chunks are taken in rank order while their text fits the budget
//! (characters of chunk text). The first chunk that does not fit ends the
//! context, so the lowest-ranked chunks are the ones dropped. When even the
//! top chunk is larger than the budget it is cut to fit.

use docqa_hybrid::RetrievedChunk;

#[derive(Debug, Clone)]
pub struct ContextEntry {
    /// Citation number, starting at 1.
    pub marker: usize,
    pub retrieved: RetrievedChunk,
    /// Chunk text as placed in the prompt.
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    pub entries: Vec<ContextEntry>,
    /// Retrieved chunks left out for lack of room.
    pub dropped: usize,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `[n] source` header followed by the chunk text, one block per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[{}] {}\n{}", e.marker, e.retrieved.source, e.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub fn build_context(retrieved: Vec<RetrievedChunk>, budget: usize) -> Context {
    let total = retrieved.len();
    let mut context = Context::default();
    let mut used = 0usize;
    for chunk in retrieved {
        let len = chunk.chunk.text.chars().count();
        if used + len <= budget {
            used += len;
            let text = chunk.chunk.text.clone();
            context.entries.push(ContextEntry { marker: context.entries.len() + 1, retrieved: chunk, text, truncated: false });
        } else if context.entries.is_empty() && budget > 0 {
            let text: String = chunk.chunk.text.chars().take(budget).collect();
            context.entries.push(ContextEntry { marker: 1, retrieved: chunk, text, truncated: true });
        } else {
            break;
        }
    }
    context.dropped = total - context.entries.len();
    if context.dropped > 0 {
        tracing::debug!(kept = context.entries.len(), dropped = context.dropped, budget, "context trimmed");
    }
    context
}
