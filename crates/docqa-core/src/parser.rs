//! Plain-text document parsing and source discovery.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::traits::DocumentParser;
use crate::types::{ParsedDocument, SourceMetadata};

/// Reads `.txt`/`.md` files as UTF-8, falling back to lossy decoding.
#[derive(Debug, Clone, Default)]
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn supports(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        lower.ends_with(".txt") || lower.ends_with(".md")
    }

    fn parse(&self, filename: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        if !self.supports(filename) {
            anyhow::bail!("unsupported file format: {filename}");
        }
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        };
        Ok(ParsedDocument::new(text, SourceMetadata::new(filename)))
    }
}

/// Files under `root` that `parser` can read, sorted by path.
pub fn list_documents(root: &Path, parser: &dyn DocumentParser) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| parser.supports(&e.file_name().to_string_lossy()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}
