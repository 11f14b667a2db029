//! Groq provider implementation.
//!
//! Groq exposes an OpenAI-compatible chat completions API. Completions are
//! requested without streaming and delivered as a single `done` chunk.

use super::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hosted chat provider speaking the OpenAI chat completions dialect.
#[derive(Debug, Clone)]
pub struct GroqProvider {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for GroqProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest::from(request);

        debug!(model = %body.model, messages = body.messages.len(), "Sending completion request");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion = response.json::<CompletionResponse>().await?;
        callback(completion.into_chunk()?);
        Ok(())
    }

    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
        Err(ProviderError::Unsupported {
            provider: "groq",
            operation: "embeddings",
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

impl From<ChatRequest> for CompletionRequest {
    fn from(request: ChatRequest) -> Self {
        Self {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            stop: request.stop,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_chunk(self) -> Result<ChatResponse> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("Completion returned no choices".to_string()))?;

        Ok(ChatResponse {
            model: self.model,
            content: choice.message.content.unwrap_or_default(),
            done: true,
        })
    }
}
