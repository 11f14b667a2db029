//! scholar - Cache-augmented research assistant
//!
//! This is the convenience wrapper crate that re-exports the scholar
//! components behind feature flags.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! scholar = "0.1"  # Includes core + retrieval tools by default
//! ```
//!
//! ```no_run
//! use scholar::prelude::*;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::resolve("config.yaml")?;
//! let manager = build_research_assistant(config).await?;
//!
//! let mut session = ChatSession::new();
//! println!("{}", manager.ask(&mut session, "What is BERT?").await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `tools` (default): Include the Wikipedia and ArXiv retrieval tools

// Re-export core
pub use scholar_core::*;
pub use scholar_plugin;

// Re-export retrieval tools if feature is enabled
#[cfg(feature = "tools")]
pub use scholar_tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use scholar_core::*;
    pub use scholar_plugin::{Permission, Plugin, PluginRegistry};

    #[cfg(feature = "tools")]
    pub use scholar_tools::{build_research_assistant, ArxivTool, WikipediaTool};
}
