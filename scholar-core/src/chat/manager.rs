//! Conversation orchestration.
//!
//! # Turn Flow
//!
//! ```text
//! input ─→ history (prior turns) ─→ AgentExecutor ─→ answer
//!   │                                                  │
//!   └──────── recorded as Human ─── recorded as AI ────┘
//! ```
//!
//! Turns are strictly sequential: `ask` takes the session mutably, so the
//! next turn cannot start until the current one has been recorded.

use super::session::ChatSession;
use crate::agent::{AgentExecutor, AgentOutcome, BuiltinPrompt, FilePrompt, PromptSource};
use crate::config::Config;
use crate::provider::{create_chat_provider, Provider};
use anyhow::{Context, Result};
use scholar_plugin::PluginRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answers user input with a tool-using agent, keeping conversation context.
///
/// # Examples
///
/// ```no_run
/// use scholar_core::chat::{ChatManager, ChatSession};
/// use scholar_core::Config;
/// use scholar_plugin::{Permission, PluginRegistry};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::resolve("config.yaml")?;
/// let registry = PluginRegistry::new(Permission::RETRIEVAL);
/// let manager = ChatManager::new(config, registry).await?;
///
/// let mut session = ChatSession::new();
/// let answer = manager.ask(&mut session, "Who wrote 'Attention Is All You Need'?").await?;
/// println!("AI: {}", answer);
/// # Ok(())
/// # }
/// ```
pub struct ChatManager {
    config: Config,
    executor: AgentExecutor,
}

impl ChatManager {
    /// Creates a manager using the chat provider selected in `config`.
    ///
    /// # Errors
    ///
    /// Fails when the provider cannot be configured (e.g. no API key) or the
    /// configured prompt template is unreadable or invalid.
    pub async fn new(config: Config, registry: PluginRegistry) -> Result<Self> {
        let provider = create_chat_provider(&config)?;
        Self::with_provider(config, registry, provider).await
    }

    /// Creates a manager around an already-built chat provider.
    pub async fn with_provider(
        config: Config,
        registry: PluginRegistry,
        provider: Arc<dyn Provider>,
    ) -> Result<Self> {
        let template = match &config.agent.prompt_path {
            Some(path) => FilePrompt::new(path).template().await,
            None => BuiltinPrompt.template().await,
        }
        .context("Failed to load agent prompt")?;

        let executor = AgentExecutor::new(
            provider,
            Arc::new(registry),
            template,
            config.llm.model.clone(),
        )
        .with_temperature(config.llm.temperature)
        .with_max_iterations(config.agent.max_iterations)
        .with_early_stopping(config.agent.early_stopping);

        info!(
            provider = config.llm.provider.as_str(),
            model = %config.llm.model,
            tools = ?executor.registry().names(),
            "Chat manager ready"
        );

        Ok(Self { config, executor })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        self.executor.registry()
    }

    /// Runs one conversational turn.
    ///
    /// The agent sees the turns recorded before this one. The input is then
    /// recorded as a human turn whatever the outcome, and the answer as an
    /// assistant turn when the turn succeeds.
    pub async fn ask(&self, session: &mut ChatSession, input: &str) -> Result<String> {
        let history = session.render();
        debug!(turns = session.len(), "Replaying history");

        let result = self.executor.run(input, &history).await;
        session.push_human(input);

        let outcome = result.context("Agent failed to answer")?;
        log_outcome(&outcome);

        session.push_assistant(outcome.output.clone());
        Ok(outcome.output)
    }

    /// Answers a single question with no conversation history.
    pub async fn query(&self, input: &str) -> Result<String> {
        let outcome = self
            .executor
            .run(input, "")
            .await
            .context("Agent failed to answer")?;
        log_outcome(&outcome);
        Ok(outcome.output)
    }
}

fn log_outcome(outcome: &AgentOutcome) {
    if outcome.stopped_early {
        warn!(iterations = outcome.iterations, "Answer produced after hitting the iteration limit");
    } else {
        info!(
            iterations = outcome.iterations,
            tool_calls = outcome.steps.iter().filter(|s| s.action.is_some()).count(),
            "Turn complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, ProviderError};
    use async_trait::async_trait;
    use scholar_plugin::Permission;
    use std::sync::Mutex;

    /// Answers every prompt directly and remembers what it was sent.
    #[derive(Default)]
    struct EchoModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for EchoModel {
        async fn chat<'a>(
            &'a self,
            request: ChatRequest,
            mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            let prompt = request.messages[0].content.clone();
            let count = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(prompt);
                prompts.len()
            };
            callback(ChatResponse {
                model: request.model,
                content: format!("Thought: Do I need to use a tool? No\nFinal Answer: answer {}", count),
                done: true,
            });
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> crate::provider::Result<Vec<f32>> {
            Err(ProviderError::Other("no embeddings".to_string()))
        }
    }

    struct FailingModel;

    #[async_trait]
    impl Provider for FailingModel {
        async fn chat<'a>(
            &'a self,
            _request: ChatRequest,
            _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            Err(ProviderError::Api {
                status: 503,
                body: "unavailable".to_string(),
            })
        }

        async fn embed(&self, _text: &str, _model: &str) -> crate::provider::Result<Vec<f32>> {
            Err(ProviderError::Other("no embeddings".to_string()))
        }
    }

    async fn manager(provider: Arc<dyn Provider>) -> ChatManager {
        ChatManager::with_provider(
            Config::default(),
            PluginRegistry::new(Permission::RETRIEVAL),
            provider,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_records_turns_and_replays_history() {
        let model = Arc::new(EchoModel::default());
        let manager = manager(model.clone()).await;
        let mut session = ChatSession::new();

        let first = manager.ask(&mut session, "hi").await.unwrap();
        assert_eq!(first, "answer 1");

        let second = manager.ask(&mut session, "what is BERT?").await.unwrap();
        assert_eq!(second, "answer 2");
        assert_eq!(session.len(), 4);

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[1].contains("Human: hi\nAI: answer 1"));
        // The current input is shown once, as the new input, not in the history.
        assert!(!prompts[1].contains("Human: what is BERT?"));
        assert!(prompts[1].contains("New input: what is BERT?"));
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_session_usable() {
        let manager = manager(Arc::new(FailingModel)).await;
        let mut session = ChatSession::new();

        assert!(manager.ask(&mut session, "hi").await.is_err());
        assert_eq!(session.render(), "Human: hi");
    }

    #[tokio::test]
    async fn test_query_is_stateless() {
        let model = Arc::new(EchoModel::default());
        let manager = manager(model.clone()).await;

        manager.query("one").await.unwrap();
        manager.query("two").await.unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(!prompts[1].contains("Human: one"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_rejected() {
        let result = ChatManager::new(Config::default(), PluginRegistry::new(Permission::RETRIEVAL)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_custom_prompt_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "CUSTOM {input}\n{agent_scratchpad}").unwrap();

        let mut config = Config::default();
        config.agent.prompt_path = Some(path.display().to_string());

        let model = Arc::new(EchoModel::default());
        let manager = ChatManager::with_provider(
            config,
            PluginRegistry::new(Permission::RETRIEVAL),
            model.clone(),
        )
        .await
        .unwrap();

        manager.query("x").await.unwrap();
        assert!(model.prompts.lock().unwrap()[0].starts_with("CUSTOM x"));
    }
}
