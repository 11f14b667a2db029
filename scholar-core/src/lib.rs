//! scholar-core - Research assistant engine
//!
//! Provides the building blocks of a cache-augmented research assistant:
//! - LLM provider abstraction (Groq, Ollama)
//! - Similarity-indexed document caches (LanceDB, Qdrant, in-memory)
//! - A bounded ReAct agent
//! - Chat sessions and configuration
//!
//! ## Primary API
//!
//! Most users want [`ChatManager`] plus a [`ChatSession`]. The retrieval
//! tools themselves live in `scholar-tools`.

pub mod agent;
pub mod chat;
pub mod config;
pub mod provider;
pub mod rag;

pub use agent::{AgentError, AgentExecutor, AgentOutcome, EarlyStopping};
pub use chat::{ChatManager, ChatSession, Role, Turn};
pub use config::{Config, ConfigError};
pub use provider::{ChatRequest, ChatResponse, Message, Provider, ProviderError};
pub use rag::{CacheCollection, CacheStore, Document, Embedder, MAX_DOCS_RETRIEVED};
