//! LLM provider abstraction layer.
//!
//! This module defines a common interface for different LLM backends
//! (Groq, Ollama) to provide chat completions and embeddings.

mod types;
pub mod groq;
pub mod ollama;

// Re-export common types
pub use types::{
    complete,
    ChatRequest,
    ChatResponse,
    EmbedRequest,
    EmbedResponse,
    Message,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use groq::GroqProvider;
pub use ollama::OllamaProvider;

use crate::config::{ChatProviderKind, Config, ConfigError, API_KEY_VAR};
use std::sync::Arc;

/// Builds the chat provider selected by `llm.provider`.
///
/// Fails when the hosted provider is selected without an API key.
pub fn create_chat_provider(config: &Config) -> std::result::Result<Arc<dyn Provider>, ConfigError> {
    match config.llm.provider {
        ChatProviderKind::Groq => {
            let api_key = config
                .llm
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or(ConfigError::MissingApiKey {
                    provider: ChatProviderKind::Groq.as_str(),
                    var: API_KEY_VAR,
                })?;
            Ok(Arc::new(GroqProvider::new(config.llm.base_url(), api_key)))
        }
        ChatProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(config.llm.base_url()))),
    }
}

/// Builds the provider serving cache embeddings.
pub fn create_embedding_provider(config: &Config) -> Arc<dyn Provider> {
    Arc::new(OllamaProvider::new(config.embedding.base_url.clone()))
}
