//! Vector store abstraction and factory.
//!
//! This module provides a unified interface for different vector database
//! implementations. Stores are partitioned into named collections which are
//! created on first insert.

use super::inmemory_store::InMemoryVectorStore;
use super::lancedb_store::LanceDbStore;
use super::qdrant_store::QdrantStore;
use super::types::{Record, SearchResult};
use crate::config::{StorageConfig, StorageMode};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Unified interface for vector database operations.
///
/// Implementations handle document storage and similarity search across
/// different backends (LanceDB embedded, Qdrant over gRPC, in-memory).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Appends records to a collection, creating it if needed.
    ///
    /// Records are never deduplicated: adding the same document twice stores
    /// it twice on every backend.
    async fn add(&self, collection: &str, records: Vec<Record>) -> Result<()>;

    /// Searches a collection for the records most similar to `query_embedding`.
    ///
    /// Returns at most `limit` results sorted by descending similarity, and an
    /// empty list when the collection does not exist yet.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Returns the number of records in a collection (0 if it does not exist).
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Removes a collection and everything in it.
    async fn drop_collection(&self, collection: &str) -> Result<()>;
}

/// Creates a vector store instance based on the storage mode.
///
/// - `Embedded` mode uses LanceDB for zero-setup, on-disk storage
/// - `Grpc` mode uses Qdrant for remote server connectivity
/// - `Memory` mode keeps everything in the process
pub async fn create_vector_store(storage_config: &StorageConfig) -> Result<Arc<dyn VectorStore>> {
    match &storage_config.storage_mode {
        StorageMode::Embedded { path } => {
            let store = LanceDbStore::new(path).await?;
            Ok(Arc::new(store))
        }
        StorageMode::Grpc { url } => {
            let store = QdrantStore::new(url)?;
            Ok(Arc::new(store))
        }
        StorageMode::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}
