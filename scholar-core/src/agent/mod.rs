//! ReAct agent.
//!
//! The agent answers a query by letting a chat model alternate between
//! reasoning and tool calls:
//!
//! ```text
//! prompt + scratchpad → model → Action? ─ yes → run tool → Observation → scratchpad
//!                                  │
//!                                  └─ Final Answer → done
//! ```
//!
//! The loop is bounded by `agent.max_iterations` model calls per query.

mod executor;
mod parser;
mod prompt;

pub use crate::config::EarlyStopping;
pub use executor::{format_scratchpad, AgentExecutor, AgentOutcome, IntermediateStep, STOPPED_MESSAGE};
pub use parser::{parse_react_output, AgentAction, AgentStep, ParseError};
pub use prompt::{render, validate_template, BuiltinPrompt, FilePrompt, PromptSource, PromptVars};

use crate::provider::ProviderError;
use scholar_plugin::PluginError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: PluginError,
    },

    #[error("Invalid prompt template: {0}")]
    Prompt(String),

    #[error("Failed to read prompt template {path}: {source}")]
    PromptRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AgentError>;
