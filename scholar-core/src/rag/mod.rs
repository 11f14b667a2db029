//! Similarity-indexed document caches.
//!
//! The retrieval tools check a local cache before going to Wikipedia or
//! ArXiv, and write what they fetch back for next time. This module owns
//! that cache.
//!
//! # Architecture
//!
//! - [`VectorStore`]: backend trait over named collections (LanceDB on disk,
//!   Qdrant over gRPC, or in memory)
//! - [`Embedder`]: turns text into vectors through a [`Provider`]
//! - [`CacheCollection`]: one named collection plus the embedder, exposing
//!   text-in, documents-out `similarity_search` and `add_documents`
//! - [`CacheStore`]: opens the backend once and hands out the two
//!   collections the tools use
//!
//! # Growth
//!
//! Collections are append-only. Nothing here updates or evicts documents;
//! the only way to shrink a cache is to drop the whole collection.
//!
//! [`Provider`]: crate::provider::Provider

mod embedder;
mod inmemory_store;
mod lancedb_store;
mod qdrant_store;
mod store;
mod types;

pub use embedder::{Embedder, EmbedderError};
pub use inmemory_store::InMemoryVectorStore;
pub use lancedb_store::LanceDbStore;
pub use qdrant_store::QdrantStore;
pub use store::{create_vector_store, VectorStore};
pub use types::{filter_complex_metadata, Document, Metadata, Record, SearchResult};

use crate::config::StorageConfig;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Maximum number of documents a retrieval returns.
pub const MAX_DOCS_RETRIEVED: usize = 5;

/// Collection caching Wikipedia pages.
pub const WIKI_COLLECTION: &str = "wiki_cache";
/// Collection caching ArXiv abstracts.
pub const ARXIV_COLLECTION: &str = "arxiv_cache";

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Document {id} has non-scalar metadata field '{key}'")]
    ComplexMetadata { id: String, key: String },

    #[error("Vector store error: {0}")]
    Store(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// A named cache collection bound to an embedder.
///
/// This is the whole contract the retrieval tools rely on: search by text,
/// append documents. Cloning is cheap and clones share the backend.
#[derive(Clone)]
pub struct CacheCollection {
    name: String,
    store: Arc<dyn VectorStore>,
    embedder: Embedder,
    min_score: Option<f32>,
}

impl CacheCollection {
    pub fn new(name: impl Into<String>, store: Arc<dyn VectorStore>, embedder: Embedder) -> Self {
        Self {
            name: name.into(),
            store,
            embedder,
            min_score: None,
        }
    }

    /// Hits scoring below `min_score` are dropped from search results.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns up to `limit` cached documents ranked by similarity to `query`.
    ///
    /// Empty when the collection is empty or nothing clears the relevance
    /// floor.
    pub async fn similarity_search(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let query_embedding = self.embedder.embed(query).await?;

        let results = self
            .store
            .search(&self.name, &query_embedding, limit)
            .await
            .map_err(RagError::Store)?;

        debug!(collection = %self.name, hits = results.len(), "Similarity search finished");

        Ok(results
            .into_iter()
            .filter(|result| self.min_score.map_or(true, |floor| result.score >= floor))
            .map(|result| result.document)
            .collect())
    }

    /// Embeds `documents` and appends them to the collection.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if any document carries non-scalar
    /// metadata; run them through [`filter_complex_metadata`] first.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<()> {
        if let Some((document, key)) = documents.iter().find_map(|document| {
            document
                .metadata
                .iter()
                .find(|(_, value)| !types::is_scalar(value))
                .map(|(key, _)| (document, key))
        }) {
            return Err(RagError::ComplexMetadata {
                id: document.id.clone(),
                key: key.clone(),
            });
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records = documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, embedding)| Record {
                document,
                embedding,
            })
            .collect();

        self.store
            .add(&self.name, records)
            .await
            .map_err(RagError::Store)
    }

    /// Number of documents in the collection.
    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.name).await.map_err(RagError::Store)
    }

    /// Drops every document in the collection.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .drop_collection(&self.name)
            .await
            .map_err(RagError::Store)
    }
}

/// The persistent cache, partitioned into the Wikipedia and ArXiv collections.
#[derive(Clone)]
pub struct CacheStore {
    wikipedia: CacheCollection,
    arxiv: CacheCollection,
}

impl CacheStore {
    /// Opens the configured backend and binds both collections to `embedder`.
    pub async fn open(storage: &StorageConfig, embedder: Embedder) -> Result<Self> {
        let store = create_vector_store(storage)
            .await
            .map_err(RagError::Store)?;
        Ok(Self::with_store(store, embedder, storage.min_score))
    }

    /// Binds both collections to an existing backend.
    pub fn with_store(
        store: Arc<dyn VectorStore>,
        embedder: Embedder,
        min_score: Option<f32>,
    ) -> Self {
        let collection = |name: &str| {
            CacheCollection::new(name, Arc::clone(&store), embedder.clone())
                .with_min_score(min_score)
        };

        Self {
            wikipedia: collection(WIKI_COLLECTION),
            arxiv: collection(ARXIV_COLLECTION),
        }
    }

    pub fn wikipedia(&self) -> CacheCollection {
        self.wikipedia.clone()
    }

    pub fn arxiv(&self) -> CacheCollection {
        self.arxiv.clone()
    }

    pub fn collections(&self) -> [&CacheCollection; 2] {
        [&self.wikipedia, &self.arxiv]
    }
}
