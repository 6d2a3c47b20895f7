//! Capabilities the core depends on but does not implement itself.

use std::time::Duration;

use crate::types::ParsedDocument;

/// Text to fixed-dimension vectors. Every vector returned by one embedder has
/// length `dim()`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Parameters for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: usize) -> Self {
        Self { prompt: prompt.into(), max_tokens, temperature: 0.1, top_p: 0.9 }
    }
}

/// A text-generation provider. Failures are reported as
/// `Error::ProviderUnavailable` or `Error::Timeout`, never by panicking.
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerationRequest) -> crate::error::Result<String>;

    /// Provider-specific timeout; the caller's default applies when `None`.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Document bytes to text plus metadata. Failures concern one document only.
pub trait DocumentParser: Send + Sync {
    fn supports(&self, filename: &str) -> bool;
    fn parse(&self, filename: &str, bytes: &[u8]) -> anyhow::Result<ParsedDocument>;
}

/// Opaque persistence for index snapshots.
pub trait Store: Send + Sync {
    fn read(&self) -> anyhow::Result<Vec<u8>>;
    fn write(&self, bytes: &[u8]) -> anyhow::Result<()>;
}
