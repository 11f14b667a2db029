use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Metadata attached to a [`Document`].
///
/// Values may be arbitrary JSON while a document is in flight, but only
/// scalars (strings, numbers, booleans) can be persisted to a cache.
pub type Metadata = HashMap<String, Value>;

/// A unit of retrieved content.
///
/// Documents are produced by live sources and written to the caches; the
/// caches hand them back on later similarity searches.
///
/// # Example
///
/// ```no_run
/// # use scholar_core::rag::Document;
/// let doc = Document::new("wikipedia", "Transformers are a deep learning architecture...")
///     .with_metadata("title", "Transformer (deep learning architecture)")
///     .with_metadata("source", "https://en.wikipedia.org/wiki/Transformer");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    /// Creates a document whose id is derived from `origin` and the content,
    /// so the same text from the same source always gets the same id.
    pub fn new(origin: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut hasher = Sha256::new();
        hasher.update(origin.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        let id = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect();

        Self {
            id,
            content,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Looks up a string metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// True when every metadata value can be persisted.
    pub fn is_scalar_metadata(&self) -> bool {
        self.metadata.values().all(is_scalar)
    }

    /// Drops every metadata value that cannot be persisted.
    pub fn sanitized(mut self) -> Self {
        self.metadata.retain(|_, value| is_scalar(value));
        self
    }
}

pub(crate) fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Returns `documents` with non-scalar metadata (arrays, objects, nulls)
/// removed, ready to be added to a cache.
pub fn filter_complex_metadata(documents: &[Document]) -> Vec<Document> {
    documents.iter().cloned().map(Document::sanitized).collect()
}

/// A document together with its embedding, as handed to a vector store.
#[derive(Debug, Clone)]
pub struct Record {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// A search result containing a document and its similarity score.
///
/// Returned by vector search operations, ordered by descending similarity
/// score. Scores are cosine similarities, so higher is better and most text
/// embeddings land between 0.0 and 1.0.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_are_stable() {
        let a = Document::new("wikipedia", "same text");
        let b = Document::new("wikipedia", "same text");
        let c = Document::new("arxiv", "same text");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_sanitize_drops_nested_values() {
        let doc = Document::new("arxiv", "abstract")
            .with_metadata("entry_id", "http://arxiv.org/abs/1706.03762v7")
            .with_metadata("year", 2017)
            .with_metadata("open_access", true)
            .with_metadata("links", json!(["http://arxiv.org/pdf/1706.03762v7"]))
            .with_metadata("extra", json!({ "doi": "10.1/x" }))
            .with_metadata("comment", Value::Null);

        assert!(!doc.is_scalar_metadata());

        let clean = doc.sanitized();
        assert!(clean.is_scalar_metadata());
        assert_eq!(clean.metadata.len(), 3);
        assert_eq!(clean.meta_str("entry_id"), Some("http://arxiv.org/abs/1706.03762v7"));
        assert_eq!(clean.metadata["year"], json!(2017));
    }

    #[test]
    fn test_filter_complex_metadata_keeps_content() {
        let docs = vec![
            Document::new("wikipedia", "one").with_metadata("tags", json!(["a"])),
            Document::new("wikipedia", "two").with_metadata("title", "Two"),
        ];

        let filtered = filter_complex_metadata(&docs);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(Document::is_scalar_metadata));
        assert_eq!(filtered[0].content, "one");
        assert_eq!(filtered[0].id, docs[0].id);
        assert_eq!(filtered[1].meta_str("title"), Some("Two"));
    }
}
