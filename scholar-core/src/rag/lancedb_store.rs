//! LanceDB vector database storage implementation.
//!
//! This module provides integration with LanceDB for embedded, on-disk vector
//! storage. Each collection is one table in the store directory.

use super::store::VectorStore;
use super::types::{Document, Metadata, Record, SearchResult};
use anyhow::{bail, Context, Result};
use arrow_array::{
    array::{ArrayRef, FixedSizeListArray, Float32Array, StringArray},
    Array, RecordBatch, RecordBatchIterator,
};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use lancedb::arrow::arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::sync::Arc;
use tracing::debug;

/// LanceDB-based vector store for embedded deployment.
///
/// Provides zero-setup, persistent vector storage using LanceDB. Tables are
/// created with the dimension of the first batch written to them.
pub struct LanceDbStore {
    conn: Connection,
}

#[async_trait]
impl VectorStore for LanceDbStore {
    async fn add(&self, collection: &str, records: Vec<Record>) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let vector_size = first.embedding.len();
        if records.iter().any(|r| r.embedding.len() != vector_size) {
            bail!("Embeddings in one batch must share a dimension");
        }

        let table = self.open_or_create(collection, vector_size).await?;
        let schema = Self::create_schema(vector_size);

        let ids: Vec<&str> = records.iter().map(|r| r.document.id.as_str()).collect();
        let contents: Vec<&str> = records
            .iter()
            .map(|r| r.document.content.as_str())
            .collect();
        let metadata = records
            .iter()
            .map(|r| serde_json::to_string(&r.document.metadata))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to encode metadata")?;
        let values: Vec<f32> = records
            .iter()
            .flat_map(|r| r.embedding.iter().copied())
            .collect();

        let vector_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            vector_size as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .context("Failed to build vector column")?;

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)) as ArrayRef,
                Arc::new(StringArray::from(contents)) as ArrayRef,
                Arc::new(vector_array) as ArrayRef,
                Arc::new(StringArray::from(metadata)) as ArrayRef,
            ],
        )
        .context("Failed to create record batch")?;

        let schema_ref = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema_ref);

        table
            .add(reader)
            .execute()
            .await
            .context("Failed to add documents to LanceDB")?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let Some(table) = self.open(collection).await? else {
            debug!(collection, "Collection does not exist yet");
            return Ok(Vec::new());
        };

        let results = table
            .query()
            .limit(limit)
            .nearest_to(query_embedding)?
            .distance_type(DistanceType::Cosine)
            .execute()
            .await
            .context("Failed to execute LanceDB query")?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut search_results = Vec::new();

        for batch in batches {
            let id_array = string_column(&batch, "id")?;
            let content_array = string_column(&batch, "content")?;
            let metadata_array = string_column(&batch, "metadata")?;
            let distance_array = batch
                .column_by_name("_distance")
                .context("Missing '_distance' column")?
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Failed to cast '_distance' to Float32Array")?;

            for i in 0..batch.num_rows() {
                let metadata: Metadata = if metadata_array.is_null(i) {
                    Metadata::new()
                } else {
                    serde_json::from_str(metadata_array.value(i))
                        .context("Failed to decode stored metadata")?
                };

                let document = Document {
                    id: id_array.value(i).to_string(),
                    content: content_array.value(i).to_string(),
                    metadata,
                };

                // Cosine distance is 1 - cosine similarity
                let score = 1.0 - distance_array.value(i);

                search_results.push(SearchResult { document, score });
            }
        }

        Ok(search_results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        match self.open(collection).await? {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        if self.exists(collection).await? {
            self.conn
                .drop_table(collection, &[])
                .await
                .context("Failed to drop table")?;
        }
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing '{}' column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Failed to cast '{}' to StringArray", name))
}

impl LanceDbStore {
    fn create_schema(vector_size: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_size as i32,
                ),
                false,
            ),
            Field::new("metadata", DataType::Utf8, true),
        ]))
    }

    /// Connects to (or creates) the store directory at `path`.
    pub async fn new(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory {}", path))?;

        let conn = connect(path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { conn })
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        let table_names = self.conn.table_names().execute().await?;
        Ok(table_names.iter().any(|name| name == collection))
    }

    async fn open(&self, collection: &str) -> Result<Option<Table>> {
        if !self.exists(collection).await? {
            return Ok(None);
        }
        let table = self
            .conn
            .open_table(collection)
            .execute()
            .await
            .context("Failed to open LanceDB table")?;
        Ok(Some(table))
    }

    async fn open_or_create(&self, collection: &str, vector_size: usize) -> Result<Table> {
        if let Some(table) = self.open(collection).await? {
            return Ok(table);
        }

        self.conn
            .create_empty_table(collection, Self::create_schema(vector_size))
            .execute()
            .await
            .context("Failed to create LanceDB table")
    }
}
