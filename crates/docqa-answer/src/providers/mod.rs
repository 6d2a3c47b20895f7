//! Generation providers and the `[providers.<name>]` configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::{Config, Settings};
use docqa_core::error::{Error, Result};
use docqa_core::traits::Generator;

mod hosted;
mod local;

pub use hosted::HostedProvider;
pub use local::OllamaProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Ollama-compatible server, normally on the same machine.
    Local,
    /// OpenAI-compatible chat completions endpoint.
    Hosted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key (hosted only).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderSpec {
    pub fn local() -> Self {
        Self { kind: ProviderKind::Local, base_url: None, model: None, api_key_env: None, timeout_secs: None }
    }

    pub fn hosted() -> Self {
        Self { kind: ProviderKind::Hosted, ..Self::local() }
    }

    /// Built-in spec for the provider names used by the default
    /// `provider_order`.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "local" => Some(Self::local()),
            "hosted" => Some(Self::hosted()),
            _ => None,
        }
    }

    pub fn build(&self, name: &str, default_timeout: Duration) -> Result<Arc<dyn Generator>> {
        let timeout = self.timeout_secs.map_or(default_timeout, Duration::from_secs);
        let provider: Arc<dyn Generator> = match self.kind {
            ProviderKind::Local => Arc::new(OllamaProvider::new(
                name,
                self.base_url.as_deref().unwrap_or(local::DEFAULT_BASE_URL),
                self.model.as_deref().unwrap_or(local::DEFAULT_MODEL),
                timeout,
            )?),
            ProviderKind::Hosted => {
                let key_env = self.api_key_env.as_deref().unwrap_or(hosted::DEFAULT_API_KEY_ENV);
                Arc::new(HostedProvider::new(
                    name,
                    self.base_url.as_deref().unwrap_or(hosted::DEFAULT_BASE_URL),
                    self.model.as_deref().unwrap_or(hosted::DEFAULT_MODEL),
                    std::env::var(key_env).ok(),
                    timeout,
                )?)
            }
        };
        Ok(provider)
    }
}

/// Providers named by `settings.provider_order`, in order. Each name is
/// looked up under `providers.<name>`; `local` and `hosted` have built-in
/// specs used when their table is absent.
pub fn build_chain(config: &Config, settings: &Settings) -> Result<Vec<Arc<dyn Generator>>> {
    let default_timeout = Duration::from_secs(settings.provider_timeout_secs);
    settings
        .provider_order
        .iter()
        .map(|name| {
            let key = format!("providers.{name}");
            let spec = if config.contains(&key) {
                config.get::<ProviderSpec>(&key).map_err(|e| Error::InvalidConfig(format!("{e:#}")))?
            } else {
                ProviderSpec::builtin(name)
                    .ok_or_else(|| Error::InvalidConfig(format!("provider '{name}' is not configured")))?
            };
            tracing::debug!(provider = %name, kind = ?spec.kind, "provider configured");
            spec.build(name, default_timeout)
        })
        .collect()
}

/// Maps a transport error, keeping timeouts distinct.
pub(crate) fn transport_error(provider: &str, after: Duration, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout { provider: provider.to_string(), after }
    } else {
        Error::ProviderUnavailable { provider: provider.to_string(), reason: err.to_string() }
    }
}

pub(crate) fn http_client(provider: &str, timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::ProviderUnavailable { provider: provider.to_string(), reason: e.to_string() })
}
