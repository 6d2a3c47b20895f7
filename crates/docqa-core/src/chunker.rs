//! Splits document text into overlapping chunks and tags each chunk with the
//! dates it mentions.
//!
//! Sizes are measured in characters. Text is split at paragraph breaks, then
//! sentence ends; a sentence longer than the budget is split between words,
//! and a run with no whitespace at all is cut hard at the limit.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::dates::{self, Confidence, NormalizedDate};
use crate::error::{Error, Result};
use crate::types::Chunk;

static PARAGRAPH_BREAK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// A chunk without dates of its own inherits the last high-confidence
    /// date seen earlier in the same document.
    pub carry_dates: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 100, carry_dates: true }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, overlap, ..Self::default() };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joint {
    Paragraph,
    Sentence,
}

impl Joint {
    fn as_str(self) -> &'static str {
        match self {
            Joint::Paragraph => "\n\n",
            Joint::Sentence => " ",
        }
    }
}

struct Piece {
    text: String,
    len: usize,
    joint: Joint,
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunks one document. Returns an empty vector for blank text.
    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let mut last_date: Option<NormalizedDate> = None;
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(position, text)| {
                let mentions = dates::extract_mentions(&text);
                let mut chunk_dates: BTreeSet<NormalizedDate> = mentions.iter().map(|m| m.date).collect();
                if chunk_dates.is_empty() && self.config.carry_dates {
                    chunk_dates.extend(last_date);
                }
                if let Some(latest) = mentions.iter().rev().find(|m| m.confidence == Confidence::High) {
                    last_date = Some(latest.date);
                }
                Chunk {
                    id: Chunk::make_id(doc_id, position),
                    doc_id: doc_id.to_string(),
                    position,
                    text,
                    dates: chunk_dates,
                    embedding: None,
                }
            })
            .collect()
    }

    /// Splits text into chunk-sized strings, each starting with the overlap
    /// carried from its predecessor.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        for piece in self.pieces(text) {
            let joint = piece.joint.as_str();
            let joint_len = joint.chars().count();
            if !current.is_empty() && current_len + joint_len + piece.len > size {
                let room = size.saturating_sub(piece.len + joint_len);
                let tail = overlap_tail(&current, self.config.overlap.min(room));
                chunks.push(std::mem::take(&mut current));
                current_len = tail.chars().count();
                current = tail;
            }
            if !current.is_empty() {
                current.push_str(joint);
                current_len += joint_len;
            }
            current.push_str(&piece.text);
            current_len += piece.len;
        }
        if !current.trim().is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn pieces(&self, text: &str) -> Vec<Piece> {
        let normalized = text.replace("\r\n", "\n");
        let paragraphs: Vec<&str> = match PARAGRAPH_BREAK.as_ref() {
            Some(re) => re.split(&normalized).collect(),
            None => normalized.split("\n\n").collect(),
        };
        let mut pieces = Vec::new();
        for paragraph in paragraphs {
            let mut joint = Joint::Paragraph;
            for sentence in sentences(paragraph.trim()) {
                for part in split_oversized(sentence, self.config.chunk_size) {
                    let len = part.chars().count();
                    pieces.push(Piece { text: part, len, joint });
                    joint = Joint::Sentence;
                }
            }
        }
        pieces
    }
}

/// Sentence spans of a paragraph; a sentence ends at `.`, `!` or `?`
/// followed by whitespace.
fn sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut chars = paragraph.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_i, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = paragraph[start..i + c.len_utf8()].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = next_i;
            }
        }
    }
    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Splits a sentence longer than `size` between words; a single word longer
/// than `size` is cut every `size` characters.
fn split_oversized(sentence: &str, size: usize) -> Vec<String> {
    if sentence.chars().count() <= size {
        return vec![sentence.to_string()];
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > size {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            parts.extend(chars.chunks(size).map(|c| c.iter().collect::<String>()));
            continue;
        }
        if !current.is_empty() && current_len + 1 + word_len > size {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// The last `max_chars` characters of `text`, moved forward to the start of
/// a word when the cut lands inside one.
fn overlap_tail(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let total = text.chars().count();
    let skip = total.saturating_sub(max_chars);
    let start = text.char_indices().nth(skip).map_or(text.len(), |(i, _)| i);
    let tail = &text[start..];
    let cut_inside_word = start > 0 && !text[..start].ends_with(char::is_whitespace);
    let tail = if cut_inside_word {
        match tail.find(char::is_whitespace) {
            Some(ws) => &tail[ws..],
            None => "",
        }
    } else {
        tail
    };
    tail.trim().to_string()
}
