//! Retrieval tools for the scholar research assistant
//!
//! Two cache-augmented tools, exposed to the agent as plugins:
//! - `wikipedia_tool`: general knowledge from Wikipedia
//! - `arxiv_tool`: scientific papers from arXiv, including lookups by paper ID
//!
//! Both check a local similarity cache first, fall back to the live source,
//! and write fresh results back to the cache.

mod arxiv;
mod retrieval;
mod source;
mod wikipedia;

pub use arxiv::{is_arxiv_identifier, normalize_arxiv_query, parse_atom_feed, ArxivEntry, ArxivSource, ArxivTool};
pub use retrieval::{render_documents, ToolError};
pub use source::{truncate_chars, LiveSource, SourceError, MAX_QUERY_CHARS};
pub use wikipedia::{WikipediaSource, WikipediaTool};

use anyhow::{Context, Result};
use scholar_core::provider::create_embedding_provider;
use scholar_core::rag::{CacheStore, Embedder};
use scholar_core::{ChatManager, Config};
use scholar_plugin::{Permission, PluginRegistry};
use std::sync::Arc;
use tracing::warn;

/// Opens the cache configured in `config.storage`.
pub async fn open_cache(config: &Config) -> Result<CacheStore> {
    let embedder = Embedder::new(
        create_embedding_provider(config),
        config.embedding.model.clone(),
    );
    CacheStore::open(&config.storage, embedder)
        .await
        .context("Failed to open document cache")
}

/// Builds a registry holding both retrieval tools, bound to `cache` and the
/// live sources configured in `config.retrieval`.
pub fn research_registry(config: &Config, cache: &CacheStore) -> Result<PluginRegistry> {
    let retrieval = &config.retrieval;

    let wikipedia = WikipediaSource::new(&retrieval.wikipedia, &retrieval.user_agent)
        .context("Failed to set up Wikipedia client")?;
    let arxiv = ArxivSource::new(&retrieval.arxiv, &retrieval.user_agent)
        .context("Failed to set up arXiv client")?;

    let mut registry = PluginRegistry::new(Permission::RETRIEVAL);
    let tools: [Arc<dyn scholar_plugin::Plugin>; 2] = [
        Arc::new(
            WikipediaTool::new(cache.wikipedia(), Arc::new(wikipedia))
                .with_limits(retrieval.max_docs, retrieval.wikipedia.max_chars),
        ),
        Arc::new(ArxivTool::new(cache.arxiv(), Arc::new(arxiv)).with_max_docs(retrieval.max_docs)),
    ];
    for tool in tools {
        let name = tool.name().to_string();
        if !registry.register(tool) {
            warn!(tool = %name, "Tool was not registered");
        }
    }
    Ok(registry)
}

/// Wires up the full assistant: embedder, cache, live sources, tools and
/// chat manager.
///
/// # Errors
///
/// Fails on invalid configuration (including a missing API key) before
/// anything else is constructed.
pub async fn build_research_assistant(config: Config) -> Result<ChatManager> {
    config.validate()?;

    let cache = open_cache(&config).await?;
    let registry = research_registry(&config, &cache)?;
    ChatManager::new(config, registry).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::config::StorageMode;

    #[tokio::test]
    async fn test_registry_holds_both_tools() {
        let mut config = Config::default();
        config.storage.storage_mode = StorageMode::Memory;

        let cache = open_cache(&config).await.unwrap();
        let registry = research_registry(&config, &cache).unwrap();

        assert_eq!(registry.names(), vec!["arxiv_tool", "wikipedia_tool"]);
        assert!(registry.describe().contains("wikipedia_tool: Use this tool"));
    }

    #[tokio::test]
    async fn test_build_requires_api_key() {
        let mut config = Config::default();
        config.storage.storage_mode = StorageMode::Memory;

        let err = build_research_assistant(config).await.err().unwrap();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn test_build_with_key() {
        let mut config = Config::default();
        config.storage.storage_mode = StorageMode::Memory;
        config.llm.api_key = Some("test-key".to_string());

        let manager = build_research_assistant(config).await.unwrap();
        assert_eq!(manager.registry().names().len(), 2);
    }
}
