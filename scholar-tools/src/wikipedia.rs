//! Wikipedia retrieval.

use crate::retrieval::{cache_best_effort, documents_output, query_schema, QueryParams, ToolError};
use crate::source::{self, http_client, truncate_chars, LiveSource, SourceError, MAX_QUERY_CHARS};
use async_trait::async_trait;
use scholar_core::config::WikipediaConfig;
use scholar_core::rag::CacheCollection;
use scholar_core::{Document, MAX_DOCS_RETRIEVED};
use scholar_plugin::{Permission, Plugin, PluginOutput};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Fetches pages through the MediaWiki action API.
pub struct WikipediaSource {
    client: reqwest::Client,
    api_url: String,
}

impl WikipediaSource {
    pub fn new(config: &WikipediaConfig, user_agent: &str) -> source::Result<Self> {
        Ok(Self {
            client: http_client(user_agent)?,
            api_url: format!("{}/w/api.php", config.base_url.trim_end_matches('/')),
        })
    }

    async fn search_titles(&self, query: &str, limit: usize) -> source::Result<Vec<String>> {
        let limit = limit.to_string();
        let body: ApiResponse<SearchQuery> = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .into_result()?
            .search
            .into_iter()
            .map(|hit| hit.title)
            .collect())
    }

    async fn fetch_page(&self, title: &str) -> source::Result<Option<Page>> {
        let body: ApiResponse<PagesQuery> = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts|info"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .into_result()?
            .pages
            .into_iter()
            .find(|page| !page.missing && page.extract.is_some()))
    }
}

#[async_trait]
impl LiveSource for WikipediaSource {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn fetch(&self, query: &str, limit: usize) -> source::Result<Vec<Document>> {
        let query = truncate_chars(query, MAX_QUERY_CHARS);
        let titles = self.search_titles(query, limit).await?;
        debug!(?titles, "Wikipedia search results");

        let mut documents = Vec::with_capacity(titles.len());
        for title in titles.iter().take(limit) {
            if let Some(page) = self.fetch_page(title).await? {
                documents.push(page.into_document());
            }
        }
        Ok(documents)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    query: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    info: String,
}

impl<T: Default> ApiResponse<T> {
    fn into_result(self) -> source::Result<T> {
        match self.error {
            Some(err) => Err(SourceError::Api(format!("{}: {}", err.code, err.info))),
            None => Ok(self.query.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    pageid: u64,
    title: String,
    #[serde(default)]
    missing: bool,
    extract: Option<String>,
    fullurl: Option<String>,
}

impl Page {
    fn into_document(self) -> Document {
        let extract = self.extract.unwrap_or_default();
        let summary = extract
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();
        let source = self.fullurl.unwrap_or_else(|| {
            format!("https://en.wikipedia.org/wiki/{}", self.title.replace(' ', "_"))
        });

        Document::new("wikipedia", extract)
            .with_metadata("title", self.title)
            .with_metadata("summary", summary)
            .with_metadata("source", source)
            .with_metadata("pageid", self.pageid)
    }
}

/// Cache-augmented Wikipedia lookup.
///
/// The cache counts as sufficient when it returns a full page of hits,
/// however relevant those hits are. Otherwise exactly one live fetch is
/// made and its documents are returned, never merged with the partial
/// cache hits.
pub struct WikipediaTool {
    cache: CacheCollection,
    source: Arc<dyn LiveSource>,
    max_docs: usize,
    max_chars: usize,
}

impl WikipediaTool {
    pub fn new(cache: CacheCollection, source: Arc<dyn LiveSource>) -> Self {
        Self {
            cache,
            source,
            max_docs: MAX_DOCS_RETRIEVED,
            max_chars: WikipediaConfig::default().max_chars,
        }
    }

    pub fn with_limits(mut self, max_docs: usize, max_chars: usize) -> Self {
        self.max_docs = max_docs;
        self.max_chars = max_chars;
        self
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, ToolError> {
        let cached = self.cache.similarity_search(query, self.max_docs).await?;
        if cached.len() >= self.max_docs {
            info!(hits = cached.len(), "Found results in Wikipedia cache");
            return Ok(cached);
        }

        info!(query, hits = cached.len(), "Cache miss, querying live Wikipedia");
        let mut live = self.source.fetch(query, self.max_docs).await?;
        live.truncate(self.max_docs);
        for doc in &mut live {
            let cut = truncate_chars(&doc.content, self.max_chars).len();
            doc.content.truncate(cut);
        }

        if !live.is_empty() {
            cache_best_effort(&self.cache, &live).await;
        }
        Ok(live)
    }
}

#[async_trait]
impl Plugin for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia_tool"
    }

    fn description(&self) -> &str {
        "Use this tool to find information on general knowledge, concepts, and topics. \
         It queries Wikipedia and returns the most relevant articles. \
         Example input: The history of the internet"
    }

    fn parameter_schema(&self) -> Value {
        query_schema("Topic or question to look up on Wikipedia")
    }

    fn required_permission(&self) -> Permission {
        Permission::RETRIEVAL
    }

    async fn execute(&self, input: Value) -> scholar_plugin::Result<PluginOutput> {
        let params = QueryParams::from_value(input)?;
        let documents = self.retrieve(&params.query).await?;
        Ok(documents_output(&documents))
    }
}
