//! Sequential provider fallback.
//!
//! Providers are tried in order. Each call runs on tokio's blocking pool
//! under a timeout; a call that times out is abandoned (its thread finishes
//! in the background) and the next provider is tried. Total latency is at
//! most the sum of the per-provider timeouts.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use docqa_core::error::{Error, Result};
use docqa_core::traits::{GenerationRequest, Generator};

#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: Error,
}

/// Result of running the chain. `provider` is `None` when every provider
/// failed, in which case `text` is empty.
#[derive(Debug)]
pub struct Generation {
    pub text: String,
    pub provider: Option<String>,
    pub failures: Vec<ProviderFailure>,
}

impl Generation {
    pub fn succeeded(&self) -> bool {
        self.provider.is_some()
    }
}

pub struct FallbackChain {
    providers: Vec<Arc<dyn Generator>>,
    default_timeout: Duration,
    runtime: Option<Runtime>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn Generator>>, default_timeout: Duration) -> Result<Self> {
        if providers.is_empty() {
            return Err(Error::InvalidConfig("at least one generation provider is required".into()));
        }
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self { providers, default_timeout, runtime: Some(runtime) })
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn generate(&self, request: &GenerationRequest) -> Generation {
        let mut failures = Vec::new();
        for provider in &self.providers {
            let name = provider.name().to_string();
            match self.call(provider, request) {
                Ok(text) => {
                    if !failures.is_empty() {
                        tracing::info!(provider = %name, skipped = failures.len(), "answered by fallback provider");
                    }
                    return Generation { text, provider: Some(name), failures };
                }
                Err(error) => {
                    tracing::warn!(provider = %name, %error, "provider failed, trying next");
                    failures.push(ProviderFailure { provider: name, error });
                }
            }
        }
        tracing::warn!(providers = failures.len(), "every provider failed");
        Generation { text: String::new(), provider: None, failures }
    }

    fn call(&self, provider: &Arc<dyn Generator>, request: &GenerationRequest) -> Result<String> {
        let name = provider.name().to_string();
        let Some(runtime) = self.runtime.as_ref() else {
            return Err(Error::ProviderUnavailable { provider: name, reason: "runtime shut down".into() });
        };
        let after = provider.timeout().unwrap_or(self.default_timeout);
        let task = {
            let provider = Arc::clone(provider);
            let request = request.clone();
            move || provider.generate(&request)
        };
        let outcome = runtime.block_on(async { tokio::time::timeout(after, tokio::task::spawn_blocking(task)).await });
        let text = match outcome {
            Err(_) => return Err(Error::Timeout { provider: name, after }),
            Ok(Err(join)) => {
                return Err(Error::ProviderUnavailable { provider: name, reason: format!("provider task failed: {join}") })
            }
            Ok(Ok(result)) => result?,
        };
        if text.trim().is_empty() {
            return Err(Error::ProviderUnavailable { provider: name, reason: "empty response".into() });
        }
        Ok(text)
    }
}

impl Drop for FallbackChain {
    fn drop(&mut self) {
        // abandoned provider calls must not block the drop
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
