//! Pieces shared by the cache-augmented retrieval tools.

use crate::source::SourceError;
use scholar_core::rag::{filter_complex_metadata, CacheCollection, RagError};
use scholar_core::Document;
use scholar_plugin::{PluginError, PluginOutput};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Cache lookup failed: {0}")]
    Cache(#[from] RagError),

    #[error("Live fetch failed: {0}")]
    Source(#[from] SourceError),
}

impl From<ToolError> for PluginError {
    fn from(err: ToolError) -> Self {
        PluginError::ExecutionFailed(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryParams {
    pub query: String,
}

impl QueryParams {
    pub fn from_value(input: Value) -> Result<Self, PluginError> {
        serde_json::from_value(input)
            .map_err(|e| PluginError::InvalidInput(format!("Invalid parameters: {}", e)))
    }
}

pub(crate) fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "required": ["query"],
        "properties": {
            "query": {
                "type": "string",
                "description": description
            }
        }
    })
}

/// Sanitizes `documents` and appends them to `cache`.
///
/// Failures are logged and swallowed: the caller already holds the live
/// documents and returns them whether or not they were cached.
pub(crate) async fn cache_best_effort(cache: &CacheCollection, documents: &[Document]) {
    let sanitized = filter_complex_metadata(documents);
    let count = sanitized.len();

    match cache.add_documents(sanitized).await {
        Ok(()) => info!(collection = cache.name(), count, "Added documents to cache"),
        Err(e) => warn!(collection = cache.name(), error = %e, "Failed to cache documents"),
    }
}

/// Renders documents as the numbered text the agent reads as an observation.
pub fn render_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No documents found.".to_string();
    }

    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let mut entry = format!("[{}]", i + 1);
            if let Some(title) = doc.meta_str("title") {
                entry.push(' ');
                entry.push_str(title);
            }
            if let Some(source) = doc.meta_str("entry_id").or_else(|| doc.meta_str("source")) {
                entry.push_str("\nSource: ");
                entry.push_str(source);
            }
            if let Some(published) = doc.meta_str("published") {
                entry.push_str("\nPublished: ");
                entry.push_str(published);
            }
            entry.push('\n');
            entry.push_str(&doc.content);
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(crate) fn documents_output(documents: &[Document]) -> PluginOutput {
    let metadata: Vec<&scholar_core::rag::Metadata> =
        documents.iter().map(|doc| &doc.metadata).collect();
    PluginOutput::new(render_documents(documents)).with_metadata(json!(metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_documents() {
        let docs = vec![
            Document::new("wikipedia", "Transformers use attention.")
                .with_metadata("title", "Transformer")
                .with_metadata("source", "https://en.wikipedia.org/wiki/Transformer"),
            Document::new("arxiv", "We propose a new network architecture.")
                .with_metadata("title", "Attention Is All You Need")
                .with_metadata("entry_id", "http://arxiv.org/abs/1706.03762v7")
                .with_metadata("published", "2017-06-12"),
        ];

        let text = render_documents(&docs);
        assert_eq!(
            text,
            "[1] Transformer\nSource: https://en.wikipedia.org/wiki/Transformer\nTransformers use attention.\n\n\
             [2] Attention Is All You Need\nSource: http://arxiv.org/abs/1706.03762v7\nPublished: 2017-06-12\nWe propose a new network architecture."
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_documents(&[]), "No documents found.");
    }

    #[test]
    fn test_query_params() {
        let params = QueryParams::from_value(json!({"query": "bert"})).unwrap();
        assert_eq!(params.query, "bert");

        let err = QueryParams::from_value(json!({"q": "bert"})).unwrap_err();
        assert!(matches!(err, PluginError::InvalidInput(_)));
    }
}
