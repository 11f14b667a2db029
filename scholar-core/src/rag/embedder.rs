//! Embedding generation using LLM providers.
//!
//! This module provides functionality to convert text into vector embeddings
//! using provider embedding models.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered with a zero-length vector.
    #[error("Empty embedding returned")]
    EmptyEmbedding,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using provider embedding models.
///
/// The caches embed both the documents they store and the queries they are
/// searched with, so both sides must go through the same `Embedder`.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The provider is unreachable or the model is not available
    /// - The provider returns an empty vector
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.provider.embed(text, &self.model).await?;
        if embedding.is_empty() {
            return Err(EmbedderError::EmptyEmbedding);
        }
        Ok(embedding)
    }

    /// Embeds each text in order.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
