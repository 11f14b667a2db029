use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable holding the hosted inference API key.
pub const API_KEY_VAR: &str = "GROQ_API_KEY";
/// Environment variable overriding the chat model name.
pub const MODEL_VAR: &str = "LLM_MODEL";
/// Environment variable overriding the embedded cache directory.
pub const CACHE_DIR_VAR: &str = "SCHOLAR_CACHE_DIR";

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{var} is not set; the {provider} provider needs an API key")]
    MissingApiKey {
        provider: &'static str,
        var: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole research assistant.
///
/// Every section has defaults, so an empty YAML file (or no file at all) is a
/// valid configuration. Secrets never come from the file: the API key is read
/// from the environment by [`Config::apply_env`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub agent: AgentConfig,
    pub chat: ChatConfig,
}

/// Which backend serves chat completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProviderKind {
    /// Hosted OpenAI-compatible endpoint (Groq)
    #[default]
    Groq,
    /// Local Ollama server
    Ollama,
}

impl ChatProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Ollama => "ollama",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

/// Configuration for the chat model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ChatProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint
    pub base_url: Option<String>,
    pub temperature: f64,

    #[serde(skip)]
    pub api_key: Option<String>,
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ChatProviderKind::default(),
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            temperature: 0.0,
            api_key: None,
        }
    }
}

/// Configuration for the embedding model used by the caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Ollama endpoint serving the embedding model
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            // all-MiniLM-L6-v2
            model: "all-minilm".to_string(),
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Vector database storage mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// Embedded storage - runs in-process with zero setup (default)
    Embedded { path: String },
    /// gRPC storage - connect to external vector database server
    Grpc { url: String },
    /// Process-local storage, lost on exit
    Memory,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Embedded {
            path: "./data/scholar_cache".to_string(),
        }
    }
}

/// Storage configuration for the retrieval caches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage_mode: StorageMode,
    /// Cache hits scoring below this similarity are ignored
    pub min_score: Option<f32>,
}

/// Configuration for the retrieval tools and their live sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Upper bound on documents returned by a single tool call
    pub max_docs: usize,
    /// Sent with every live-source request
    pub user_agent: String,
    pub wikipedia: WikipediaConfig,
    pub arxiv: ArxivConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_docs: crate::rag::MAX_DOCS_RETRIEVED,
            user_agent: concat!("scholar/", env!("CARGO_PKG_VERSION")).to_string(),
            wikipedia: WikipediaConfig::default(),
            arxiv: ArxivConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    /// Site root, e.g. `https://en.wikipedia.org`
    pub base_url: String,
    /// Page content is cut to this many characters
    pub max_chars: usize,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://en.wikipedia.org".to_string(),
            max_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    /// Atom query endpoint
    pub base_url: String,
    /// Abstracts are cut to this many characters
    pub max_chars: usize,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: "https://export.arxiv.org/api/query".to_string(),
            max_chars: 4000,
        }
    }
}

/// What the agent does when it runs out of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    /// Return a fixed "stopped" message
    #[default]
    Force,
    /// Ask the model once more for a final answer
    Generate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub early_stopping: EarlyStopping,
    /// ReAct prompt template to use instead of the built-in one
    pub prompt_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            early_stopping: EarlyStopping::default(),
            prompt_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Save the conversation here after every turn
    pub transcript_path: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load `path` (defaults when it does not exist), then layer `.env` and
    /// process environment overrides on top.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv_loaded(dotenvy::dotenv());

        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_VAR) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty(MODEL_VAR) {
            self.llm.model = model;
        }
        if let Some(path) = non_empty(CACHE_DIR_VAR) {
            self.storage.storage_mode = StorageMode::Embedded { path };
        }
    }

    /// Checks the configuration is usable before any query is accepted.
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider == ChatProviderKind::Groq
            && self.llm.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingApiKey {
                provider: self.llm.provider.as_str(),
                var: API_KEY_VAR,
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model is empty".to_string()));
        }
        if self.retrieval.max_docs == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.max_docs must be at least 1".to_string(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reports the outcome of a `.env` load. A missing file is silent.
fn dotenv_loaded<T>(result: dotenvy::Result<T>) -> bool {
    match result {
        Ok(_) => {
            debug!("Loaded .env file");
            true
        }
        Err(err) if err.not_found() => false,
        Err(err) => {
            warn!(error = %err, "Failed to load .env file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ChatProviderKind::Groq);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.base_url(), "https://api.groq.com/openai/v1");
        assert_eq!(config.retrieval.max_docs, 5);
        assert_eq!(config.retrieval.wikipedia.max_chars, 2000);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.early_stopping, EarlyStopping::Force);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingApiKey { var: API_KEY_VAR, .. }
        ));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[(API_KEY_VAR, "   ")]));
        assert!(config.llm.api_key.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            (API_KEY_VAR, "gsk_test"),
            (MODEL_VAR, "llama-3.3-70b-versatile"),
            (CACHE_DIR_VAR, "/tmp/cache"),
        ]));

        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(
            config.storage.storage_mode,
            StorageMode::Embedded {
                path: "/tmp/cache".to_string()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = ChatProviderKind::Ollama;
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut config = Config::default();
        config.llm.api_key = Some("key".to_string());
        config.agent.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
llm:
  provider: ollama
  model: llama3.2
storage:
  storage_mode:
    mode: memory
  min_score: 0.25
agent:
  early_stopping: generate
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.provider, ChatProviderKind::Ollama);
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.storage.storage_mode, StorageMode::Memory);
        assert_eq!(config.storage.min_score, Some(0.25));
        assert_eq!(config.agent.early_stopping, EarlyStopping::Generate);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.embedding.model, "all-minilm");
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("secret".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "llm: [unclosed\n  model: x").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::resolve(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::resolve(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.retrieval.max_docs, 5);
    }

    #[test]
    fn test_malformed_dotenv_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "not a valid line\n").unwrap();

        let result = dotenvy::from_path_iter(&path)
            .and_then(|iter| iter.collect::<dotenvy::Result<Vec<_>>>());
        let err = result.as_ref().unwrap_err();
        assert!(!err.not_found());
        assert!(!dotenv_loaded(result));
    }

    #[test]
    fn test_missing_dotenv_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let result = dotenvy::from_path_iter(dir.path().join(".env"));
        assert!(result.as_ref().is_err_and(|err| err.not_found()));
        assert!(!dotenv_loaded(result));
    }
}
