use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::error::{Error, Result};
use docqa_core::traits::{GenerationRequest, Generator};

use super::{http_client, transport_error};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub(crate) const DEFAULT_MODEL: &str = "llama3.1:8b";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate`, non-streaming.
pub struct OllamaProvider {
    name: String,
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl OllamaProvider {
    pub fn new(name: &str, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            client: http_client(name, timeout)?,
        })
    }
}

impl Generator for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
                top_p: request.top_p,
            },
        };
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| transport_error(&self.name, self.timeout, &e))?;
        let parsed: GenerateResponse = response.json().map_err(|e| Error::ProviderUnavailable {
            provider: self.name.clone(),
            reason: format!("unexpected response from {url}: {e}"),
        })?;
        Ok(parsed.response)
    }
}
