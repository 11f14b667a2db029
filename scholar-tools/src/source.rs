use async_trait::async_trait;
use scholar_core::Document;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Service returned an error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// An authoritative external document source.
///
/// Failures are returned to the caller as-is; sources never retry.
#[async_trait]
pub trait LiveSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetches up to `limit` documents relevant to `query`.
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Document>>;
}

/// Longest query forwarded to a live source.
pub const MAX_QUERY_CHARS: usize = 300;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client(user_agent: &str) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Cuts `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Collapses runs of whitespace, including newlines, into single spaces.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(
            squash_whitespace("  Attention Is\n  All You   Need "),
            "Attention Is All You Need"
        );
    }
}
