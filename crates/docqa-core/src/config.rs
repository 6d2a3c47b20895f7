//! Configuration loader, the retrieval/generation settings, and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nested keys, so
//! `APP_RAG__TOP_K=5` sets `rag.top_k`). The `[rag]` table deserializes into
//! [`Settings`]; unknown keys are rejected.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{validate_top_k, ResponseLength, SearchMode};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Self::defaults().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Configuration from a TOML string layered over the defaults; no files
    /// or environment are consulted.
    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Self::defaults().merge(Toml::string(toml)) }
    }

    fn defaults() -> Figment {
        Figment::new().merge(Serialized::default("rag", Settings::default()))
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.figment.find_value(key).is_ok()
    }

    /// The validated `[rag]` settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract_inner("rag")
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Every recognized retrieval and generation option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Chunk budget in characters.
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks.
    pub overlap: usize,
    pub top_k: usize,
    pub mode: SearchMode,
    pub response_length: ResponseLength,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    /// Generation providers, tried in this order.
    pub provider_order: Vec<String>,
    /// Context budget in characters.
    pub context_budget: usize,
    pub history_limit: usize,
    /// Timeout for providers that do not set their own.
    pub provider_timeout_secs: u64,
    /// Ingestion worker threads.
    pub workers: usize,
    /// Ask the provider to finish answers that look cut off.
    pub continue_truncated: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
            top_k: 3,
            mode: SearchMode::Auto,
            response_length: ResponseLength::Medium,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            provider_order: vec!["local".to_string(), "hosted".to_string()],
            context_budget: 4000,
            history_limit: 20,
            provider_timeout_secs: 60,
            workers: 4,
            continue_truncated: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking().validate()?;
        validate_top_k(self.top_k)?;
        for (name, weight) in [("semantic_weight", self.semantic_weight), ("keyword_weight", self.keyword_weight)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be a non-negative number, got {weight}")));
            }
        }
        if self.semantic_weight + self.keyword_weight <= 0.0 {
            return Err(Error::InvalidConfig("semantic_weight and keyword_weight cannot both be zero".into()));
        }
        if self.provider_order.is_empty() {
            return Err(Error::InvalidConfig("provider_order must name at least one provider".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.provider_order.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(Error::InvalidConfig(format!("provider '{dup}' listed twice in provider_order")));
        }
        for (name, value) in [
            ("context_budget", self.context_budget),
            ("history_limit", self.history_limit),
            ("workers", self.workers),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.provider_timeout_secs == 0 {
            return Err(Error::InvalidConfig("provider_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig { chunk_size: self.chunk_size, overlap: self.overlap, ..ChunkingConfig::default() }
    }

    pub fn max_response_tokens(&self) -> usize {
        self.response_length.max_tokens()
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
