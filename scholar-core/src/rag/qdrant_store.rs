//! Qdrant vector database storage implementation.
//!
//! This module provides integration with a remote Qdrant server. Each cache
//! collection maps to one Qdrant collection using cosine distance.

use super::store::VectorStore;
use super::types::{Document, Metadata, Record, SearchResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        vectors_config::Config, CreateCollectionBuilder, Distance, PointStruct,
        SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
        VectorsConfig,
    },
    Payload, Qdrant,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Qdrant-based vector store.
///
/// Documents keep their content and id in the point payload next to their
/// metadata fields, so payload keys `content` and `id` are reserved. Every
/// added record gets a fresh point id, so re-adding a document appends it.
#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, collection: &str, records: Vec<Record>) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(collection, first.embedding.len() as u64)
            .await?;

        let points = records
            .into_iter()
            .map(|record| {
                let document = record.document;
                let mut payload: serde_json::Map<String, Value> =
                    document.metadata.into_iter().collect();
                payload.insert("content".to_string(), json!(document.content));
                payload.insert("id".to_string(), json!(document.id));

                let payload = Payload::try_from(Value::Object(payload))
                    .context("Failed to build point payload")?;
                Ok(PointStruct::new(
                    new_point_id(),
                    record.embedding,
                    payload,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .context("Failed to upsert points")?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if !self.exists(collection).await? {
            return Ok(Vec::new());
        }

        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, query_embedding.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .context("Failed to search points")?;

        let results = search_result
            .result
            .into_iter()
            .map(|point| SearchResult {
                document: document_from_payload(point.payload),
                score: point.score,
            })
            .collect();

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        if !self.exists(collection).await? {
            return Ok(0);
        }

        let info = self
            .client
            .collection_info(collection)
            .await
            .context("Failed to get collection info")?;

        Ok(info
            .result
            .map(|r| r.points_count.unwrap_or(0) as usize)
            .unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        if self.exists(collection).await? {
            self.client
                .delete_collection(collection)
                .await
                .context("Failed to delete collection")?;
        }
        Ok(())
    }
}

fn new_point_id() -> String {
    Uuid::new_v4().to_string()
}

fn scalar_to_json(value: &QdrantValue) -> Option<Value> {
    if let Some(s) = value.as_str() {
        return Some(json!(s));
    }
    if let Some(i) = value.as_integer() {
        return Some(json!(i));
    }
    if let Some(f) = value.as_double() {
        return Some(json!(f));
    }
    value.as_bool().map(|b| json!(b))
}

fn document_from_payload(payload: HashMap<String, QdrantValue>) -> Document {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_default()
    };

    let metadata: Metadata = payload
        .iter()
        .filter(|(k, _)| k.as_str() != "content" && k.as_str() != "id")
        .filter_map(|(k, v)| scalar_to_json(v).map(|v| (k.clone(), v)))
        .collect();

    Document {
        id: text("id"),
        content: text("content"),
        metadata,
    }
}

impl QdrantStore {
    /// Connects to the Qdrant server at `url`.
    ///
    /// The connection is lazy; the first request surfaces an unreachable server.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .context("Failed to connect to Qdrant server")?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        self.client
            .collection_exists(collection)
            .await
            .context("Failed to check collection")
    }

    async fn ensure_collection(&self, collection: &str, vector_size: u64) -> Result<()> {
        if !self.exists(collection).await? {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(collection).vectors_config(VectorsConfig {
                        config: Some(Config::Params(
                            VectorParamsBuilder::new(vector_size, Distance::Cosine).build(),
                        )),
                    }),
                )
                .await
                .context("Failed to create collection")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ids_are_unique_uuids() {
        let first = new_point_id();
        let second = new_point_id();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Qdrant server running
    async fn test_qdrant_store_grpc() {
        let store = QdrantStore::new("http://localhost:6334").unwrap();
        let collection = "scholar_test_collection";

        let record = Record {
            document: Document::new("test", "Hello world").with_metadata("title", "Hello"),
            embedding: vec![1.0, 0.0, 0.0],
        };
        store.add(collection, vec![record]).await.unwrap();

        assert_eq!(store.count(collection).await.unwrap(), 1);
        let results = store.search(collection, &[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].document.content, "Hello world");
        assert_eq!(results[0].document.meta_str("title"), Some("Hello"));

        let duplicate = Record {
            document: Document::new("test", "Hello world"),
            embedding: vec![1.0, 0.0, 0.0],
        };
        store.add(collection, vec![duplicate]).await.unwrap();
        assert_eq!(store.count(collection).await.unwrap(), 2);

        store.drop_collection(collection).await.unwrap();
    }
}
