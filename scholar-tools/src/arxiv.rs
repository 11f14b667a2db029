//! ArXiv retrieval.

use crate::retrieval::{cache_best_effort, documents_output, query_schema, QueryParams, ToolError};
use crate::source::{
    self, http_client, squash_whitespace, truncate_chars, LiveSource, SourceError, MAX_QUERY_CHARS,
};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use scholar_core::config::ArxivConfig;
use scholar_core::rag::CacheCollection;
use scholar_core::{Document, MAX_DOCS_RETRIEVED};
use scholar_plugin::{Permission, Plugin, PluginOutput};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Lower-cases `query`, removes any `arxiv:` prefix and trims it.
///
/// `"arXiv:2301.00001"` and `"2301.00001"` normalize to the same key.
pub fn normalize_arxiv_query(query: &str) -> String {
    query.to_lowercase().replace("arxiv:", "").trim().to_string()
}

/// True when `token` looks like an arXiv identifier, e.g. `1706.03762`,
/// `2301.00001v2` or a seven-digit old-style number.
pub fn is_arxiv_identifier(token: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2}(0[1-9]|1[0-2])\.\d{4,5}(v\d+)?|\d{7}.*)$")
            .expect("arxiv identifier pattern is valid")
    })
    .is_match(token)
}

/// Fetches abstracts through the arXiv Atom API.
pub struct ArxivSource {
    client: reqwest::Client,
    api_url: String,
    max_chars: usize,
}

impl ArxivSource {
    pub fn new(config: &ArxivConfig, user_agent: &str) -> source::Result<Self> {
        Ok(Self {
            client: http_client(user_agent)?,
            api_url: config.base_url.clone(),
            max_chars: config.max_chars,
        })
    }
}

#[async_trait]
impl LiveSource for ArxivSource {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn fetch(&self, query: &str, limit: usize) -> source::Result<Vec<Document>> {
        let query = truncate_chars(query, MAX_QUERY_CHARS);
        let limit = limit.to_string();

        let tokens: Vec<&str> = query.split_whitespace().collect();
        let by_id = !tokens.is_empty() && tokens.iter().all(|t| is_arxiv_identifier(t));
        let params = if by_id {
            vec![("id_list", tokens.join(",")), ("max_results", limit)]
        } else {
            vec![
                ("search_query", format!("all:{}", query)),
                ("start", "0".to_string()),
                ("max_results", limit),
            ]
        };
        debug!(by_id, query, "Querying arXiv");

        let feed = self
            .client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let entries = parse_atom_feed(&feed)?;
        Ok(entries
            .into_iter()
            .map(|entry| entry.into_document(self.max_chars))
            .collect())
    }
}

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArxivEntry {
    pub entry_id: String,
    pub title: String,
    pub summary: String,
    pub published: String,
    pub authors: Vec<String>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub links: Vec<String>,
}

impl ArxivEntry {
    /// Builds a document from the entry, cutting the abstract to `max_chars`.
    ///
    /// `links` and `categories` are kept as arrays, so the document has to
    /// be sanitized before it can be cached.
    pub fn into_document(self, max_chars: usize) -> Document {
        let source = self
            .links
            .first()
            .cloned()
            .unwrap_or_else(|| self.entry_id.clone());
        let published = truncate_chars(&self.published, 10).to_string();

        let mut doc = Document::new("arxiv", truncate_chars(&self.summary, max_chars))
            .with_metadata("entry_id", self.entry_id)
            .with_metadata("title", self.title)
            .with_metadata("authors", self.authors.join(", "))
            .with_metadata("published", published)
            .with_metadata("source", source)
            .with_metadata("links", json!(self.links))
            .with_metadata("categories", json!(self.categories));
        if let Some(category) = self.primary_category {
            doc = doc.with_metadata("primary_category", category);
        }
        doc
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

fn xml_error(err: impl std::fmt::Display) -> SourceError {
    SourceError::Parse(format!("invalid Atom feed: {}", err))
}

fn attribute(element: &BytesStart<'_>, name: &str) -> source::Result<Option<String>> {
    match element.try_get_attribute(name).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

/// Parses an arXiv Atom response into its entries.
///
/// # Errors
///
/// Malformed XML is a [`SourceError::Parse`]. arXiv reports bad queries as
/// a feed holding a single error entry, which becomes [`SourceError::Api`].
pub fn parse_atom_feed(xml: &str) -> source::Result<Vec<ArxivEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut entry: Option<ArxivEntry> = None;
    let mut in_author = false;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => entry = Some(ArxivEntry::default()),
                    b"author" => in_author = true,
                    _ if entry.is_none() => {}
                    b"id" => field = Some(Field::Id),
                    b"title" => field = Some(Field::Title),
                    b"summary" => field = Some(Field::Summary),
                    b"published" => field = Some(Field::Published),
                    b"name" if in_author => field = Some(Field::AuthorName),
                    _ => read_empty(&e, entry.as_mut())?,
                }
                text.clear();
            }
            Event::Empty(e) => read_empty(&e, entry.as_mut())?,
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(done) = entry.take() {
                        if done.entry_id.contains("/api/errors") {
                            return Err(SourceError::Api(squash_whitespace(&done.summary)));
                        }
                        entries.push(done);
                    }
                }
                b"author" => in_author = false,
                _ => {
                    if let (Some(current), Some(f)) = (entry.as_mut(), field.take()) {
                        let value = squash_whitespace(&text);
                        match f {
                            Field::Id => current.entry_id = value,
                            Field::Title => current.title = value,
                            Field::Summary => current.summary = value,
                            Field::Published => current.published = value,
                            Field::AuthorName => current.authors.push(value),
                        }
                    }
                    text.clear();
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Reads the attribute-only elements of an entry: links and categories.
fn read_empty(element: &BytesStart<'_>, entry: Option<&mut ArxivEntry>) -> source::Result<()> {
    let Some(entry) = entry else {
        return Ok(());
    };

    match element.local_name().as_ref() {
        b"link" => {
            if let Some(href) = attribute(element, "href")? {
                entry.links.push(href);
            }
        }
        b"category" => {
            if let Some(term) = attribute(element, "term")? {
                entry.categories.push(term);
            }
        }
        b"primary_category" => entry.primary_category = attribute(element, "term")?,
        _ => {}
    }
    Ok(())
}

/// Cache-augmented arXiv lookup with a single-result path for known papers.
///
/// When the top cache hit's `entry_id` contains the normalized query, the
/// query is taken to name that paper and only the hit is returned.
pub struct ArxivTool {
    cache: CacheCollection,
    source: Arc<dyn LiveSource>,
    max_docs: usize,
}

impl ArxivTool {
    pub fn new(cache: CacheCollection, source: Arc<dyn LiveSource>) -> Self {
        Self {
            cache,
            source,
            max_docs: MAX_DOCS_RETRIEVED,
        }
    }

    pub fn with_max_docs(mut self, max_docs: usize) -> Self {
        self.max_docs = max_docs;
        self
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, ToolError> {
        let query = normalize_arxiv_query(query);

        let mut cached = self.cache.similarity_search(&query, self.max_docs).await?;
        let is_known_paper = cached
            .first()
            .and_then(|top| top.meta_str("entry_id"))
            .map_or(false, |entry_id| entry_id.contains(query.as_str()));
        if is_known_paper {
            info!(query = %query, "Found paper in ArXiv cache");
            cached.truncate(1);
            return Ok(cached);
        }

        info!(query = %query, "Cache miss, querying live ArXiv");
        let mut live = self.source.fetch(&query, self.max_docs).await?;
        live.truncate(self.max_docs);

        if !live.is_empty() {
            cache_best_effort(&self.cache, &live).await;
        }
        Ok(live)
    }
}

#[async_trait]
impl Plugin for ArxivTool {
    fn name(&self) -> &str {
        "arxiv_tool"
    }

    fn description(&self) -> &str {
        "Use this tool to find scientific papers and research articles on ArXiv. \
         It is best for technical, scientific, or academic queries. \
         It can also fetch a paper directly if you provide an ArXiv paper ID. \
         Example inputs: Quantum computing algorithms 2023, 1706.03762"
    }

    fn parameter_schema(&self) -> Value {
        query_schema("Search terms or an ArXiv paper ID")
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

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>https://arxiv.org/api/abc</id>
  <title>arXiv Query: id_list=1706.03762</title>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
recurrent or convolutional neural networks &amp; attention.
    </summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_arxiv_query("arXiv:2301.00001"), "2301.00001");
        assert_eq!(normalize_arxiv_query("  2301.00001 "), "2301.00001");
        assert_eq!(normalize_arxiv_query("ARXIV: Quantum Computing"), "quantum computing");
        assert_eq!(normalize_arxiv_query("arxiv:"), "");
    }

    #[test]
    fn test_identifier_detection() {
        assert!(is_arxiv_identifier("1706.03762"));
        assert!(is_arxiv_identifier("2301.00001v2"));
        assert!(is_arxiv_identifier("0704.0001"));
        assert!(is_arxiv_identifier("9901001"));
        assert!(!is_arxiv_identifier("1713.03762"));
        assert!(!is_arxiv_identifier("attention"));
        assert!(!is_arxiv_identifier("2023"));
    }

    #[test]
    fn test_parse_feed() {
        let entries = parse_atom_feed(FEED).unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.entry_id, "http://arxiv.org/abs/1706.03762v7");
        assert_eq!(entry.title, "Attention Is All You Need");
        assert!(entry.summary.starts_with("The dominant sequence"));
        assert!(entry.summary.ends_with("neural networks & attention."));
        assert_eq!(entry.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(entry.primary_category.as_deref(), Some("cs.CL"));
        assert_eq!(entry.categories, vec!["cs.CL", "cs.LG"]);
        assert_eq!(entry.links.len(), 2);
    }

    #[test]
    fn test_entry_to_document() {
        let entry = parse_atom_feed(FEED).unwrap().remove(0);
        let doc = entry.into_document(20);

        assert_eq!(doc.content.chars().count(), 20);
        assert_eq!(doc.meta_str("entry_id"), Some("http://arxiv.org/abs/1706.03762v7"));
        assert_eq!(doc.meta_str("authors"), Some("Ashish Vaswani, Noam Shazeer"));
        assert_eq!(doc.meta_str("published"), Some("2017-06-12"));
        assert_eq!(doc.meta_str("source"), Some("http://arxiv.org/abs/1706.03762v7"));
        assert!(!doc.is_scalar_metadata());
        assert!(doc.clone().sanitized().is_scalar_metadata());
    }

    #[test]
    fn test_error_feed() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
    <title>Error</title>
    <summary>incorrect id format for 1234</summary>
  </entry>
</feed>"#;
        let err = parse_atom_feed(feed).unwrap_err();
        assert!(matches!(err, SourceError::Api(ref msg) if msg == "incorrect id format for 1234"));
    }

    #[test]
    fn test_empty_feed() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_atom_feed(feed).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed() {
        assert!(matches!(
            parse_atom_feed("<feed><entry></feed>"),
            Err(SourceError::Parse(_))
        ));
    }
}
