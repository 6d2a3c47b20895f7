use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::error::{Error, Result};
use docqa_core::traits::{GenerationRequest, Generator};

use super::{http_client, transport_error};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub(crate) const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions`.
pub struct HostedProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl HostedProvider {
    pub fn new(name: &str, base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
            client: http_client(name, timeout)?,
        })
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::ProviderUnavailable { provider: self.name.clone(), reason: reason.into() }
    }
}

impl Generator for HostedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(self.unavailable("no API key configured"));
        };
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: &request.prompt }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| transport_error(&self.name, self.timeout, &e))?;
        let parsed: ChatResponse = response.json().map_err(|e| self.unavailable(format!("unexpected response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.unavailable("response has no message content"))
    }
}
