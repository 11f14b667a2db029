//! The bounded ReAct loop.

use super::parser::{parse_react_output, AgentAction, AgentStep};
use super::prompt::{render, PromptVars};
use super::{AgentError, Result};
use crate::config::{AgentConfig, EarlyStopping};
use crate::provider::{complete, ChatRequest, Message, Provider};
use scholar_plugin::PluginRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Returned when the iteration budget runs out under [`EarlyStopping::Force`].
pub const STOPPED_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

const STOP_SEQUENCE: &str = "\nObservation:";
const FORMAT_REMINDER: &str =
    "Reply with either an Action and Action Input, or a Final Answer, in the format described above.";
const GENERATE_FINAL: &str =
    "\n\nI now need to return a final answer based on the previous steps:";

/// One completed iteration: what the model said and what it was told back.
#[derive(Debug, Clone)]
pub struct IntermediateStep {
    /// Raw model output for the iteration
    pub log: String,
    /// The tool call, or `None` when the output could not be parsed
    pub action: Option<AgentAction>,
    pub observation: String,
}

/// Result of answering one query.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub output: String,
    pub steps: Vec<IntermediateStep>,
    /// Model calls made inside the budget
    pub iterations: usize,
    /// True when the budget ran out before a final answer
    pub stopped_early: bool,
}

/// Drives a chat model through Thought/Action/Observation rounds until it
/// gives a final answer or the iteration budget is spent.
///
/// Every model call counts against the budget, including calls whose output
/// could not be parsed or named an unknown tool; those are answered with a
/// corrective observation rather than failing the query. Tool failures
/// (e.g. a live source being unreachable) do fail the query.
pub struct AgentExecutor {
    provider: Arc<dyn Provider>,
    registry: Arc<PluginRegistry>,
    template: String,
    model: String,
    temperature: f64,
    max_iterations: usize,
    early_stopping: EarlyStopping,
}

impl AgentExecutor {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<PluginRegistry>,
        template: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            registry,
            template: template.into(),
            model: model.into(),
            temperature: 0.0,
            max_iterations: defaults.max_iterations,
            early_stopping: defaults.early_stopping,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_early_stopping(mut self, early_stopping: EarlyStopping) -> Self {
        self.early_stopping = early_stopping;
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Answers `input` given the rendered conversation so far.
    pub async fn run(&self, input: &str, chat_history: &str) -> Result<AgentOutcome> {
        let mut steps: Vec<IntermediateStep> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let scratchpad = format_scratchpad(&steps);
            let text = self.call_model(input, chat_history, &scratchpad).await?;
            debug!(iteration, output = %text, "Model step");

            match parse_react_output(&text) {
                Ok(AgentStep::Finish(output)) => {
                    info!(iteration, "Agent finished");
                    return Ok(AgentOutcome {
                        output,
                        steps,
                        iterations: iteration,
                        stopped_early: false,
                    });
                }
                Ok(AgentStep::Action(action)) => {
                    let observation = self.observe(&action).await?;
                    steps.push(IntermediateStep {
                        log: action.log.clone(),
                        action: Some(action),
                        observation,
                    });
                }
                Err(err) => {
                    warn!(iteration, error = %err, "Could not parse model output, asking again");
                    steps.push(IntermediateStep {
                        log: text,
                        action: None,
                        observation: format!("{}. {}", err, FORMAT_REMINDER),
                    });
                }
            }
        }

        warn!(max_iterations = self.max_iterations, "Iteration budget exhausted");
        let output = match self.early_stopping {
            EarlyStopping::Force => STOPPED_MESSAGE.to_string(),
            EarlyStopping::Generate => self.generate_final(input, chat_history, &steps).await?,
        };

        Ok(AgentOutcome {
            output,
            steps,
            iterations: self.max_iterations,
            stopped_early: true,
        })
    }

    async fn observe(&self, action: &AgentAction) -> Result<String> {
        if self.registry.get(&action.tool).is_none() {
            warn!(tool = %action.tool, "Model asked for an unknown tool");
            return Ok(format!(
                "{} is not a valid tool, try one of [{}].",
                action.tool,
                self.registry.names().join(", ")
            ));
        }

        info!(tool = %action.tool, input = %action.input, "Executing tool");
        let output = self
            .registry
            .execute(&action.tool, serde_json::json!({ "query": action.input }))
            .await
            .map_err(|source| AgentError::Tool {
                tool: action.tool.clone(),
                source,
            })?;
        Ok(output.content)
    }

    async fn generate_final(
        &self,
        input: &str,
        chat_history: &str,
        steps: &[IntermediateStep],
    ) -> Result<String> {
        let mut scratchpad = format_scratchpad(steps);
        scratchpad.push_str(GENERATE_FINAL);

        let text = self.call_model(input, chat_history, &scratchpad).await?;
        match parse_react_output(&text) {
            Ok(AgentStep::Finish(output)) => Ok(output),
            _ => Ok(text.trim().to_string()),
        }
    }

    async fn call_model(&self, input: &str, chat_history: &str, scratchpad: &str) -> Result<String> {
        let tools = self.registry.describe();
        let tool_names = self.registry.names().join(", ");
        let prompt = render(
            &self.template,
            &PromptVars {
                tools: &tools,
                tool_names: &tool_names,
                chat_history,
                input,
                agent_scratchpad: scratchpad,
            },
        );

        let request = ChatRequest::new(&self.model, vec![Message::user(prompt)])
            .with_temperature(self.temperature)
            .with_stop(STOP_SEQUENCE);

        Ok(complete(self.provider.as_ref(), request).await?)
    }
}

/// Renders completed steps the way the model is expected to continue them.
pub fn format_scratchpad(steps: &[IntermediateStep]) -> String {
    let mut thoughts = String::new();
    for step in steps {
        thoughts.push_str(&step.log);
        thoughts.push_str("\nObservation: ");
        thoughts.push_str(&step.observation);
        thoughts.push_str("\nThought: ");
    }
    thoughts
}
