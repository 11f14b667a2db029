//! Ollama provider implementation.
//!
//! Serves the embeddings behind the retrieval caches, and optionally chat for
//! fully local setups.

use super::types::*;
use async_trait::async_trait;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);

        let mut options = HashMap::new();
        options.insert(
            "temperature".to_string(),
            serde_json::json!(request.temperature),
        );
        if !request.stop.is_empty() {
            options.insert("stop".to_string(), serde_json::json!(request.stop));
        }

        let ollama_request = OllamaChatRequest {
            model: request.model,
            messages: request
                .messages
                .into_iter()
                .map(|m| OllamaMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            options: Some(options),
            stream: true,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&ollama_request)
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

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();

                if line.len() <= 1 {
                    continue;
                }

                let line_str = String::from_utf8_lossy(&line[..line.len() - 1]);

                match serde_json::from_str::<OllamaChatResponse>(&line_str) {
                    Ok(ollama_response) => callback(ChatResponse {
                        model: ollama_response.model,
                        content: ollama_response.message.content,
                        done: ollama_response.done,
                    }),
                    Err(e) => debug!(error = %e, "Skipping unparseable Ollama chunk"),
                }
            }
        }

        Ok(())
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&embed_request)
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

        let embed_response = response.json::<EmbedResponse>().await?;

        embed_response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
}
