//! Prompt templates for the ReAct agent.
//!
//! A template is plain text with five placeholders: `{tools}`,
//! `{tool_names}`, `{chat_history}`, `{input}` and `{agent_scratchpad}`.

use super::{AgentError, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::path::PathBuf;
use std::sync::OnceLock;

const REQUIRED_PLACEHOLDERS: [&str; 2] = ["{input}", "{agent_scratchpad}"];

const REACT_CHAT_TEMPLATE: &str = r#"You are a research assistant. You answer questions in a friendly, precise way and use Wikipedia for general knowledge and ArXiv for scientific papers whenever your own knowledge is not enough or the user asks about a specific source.

TOOLS:
------

You have access to the following tools:

{tools}

To use a tool, please use the following format:

```
Thought: Do I need to use a tool? Yes
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
```

When you have a response to say to the Human, or if you do not need to use a tool, you MUST use the format:

```
Thought: Do I need to use a tool? No
Final Answer: [your response here]
```

Begin!

Previous conversation history:
{chat_history}

New input: {input}
{agent_scratchpad}"#;

/// Supplies the agent's prompt template.
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn template(&self) -> Result<String>;
}

/// The ReAct chat template compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrompt;

#[async_trait]
impl PromptSource for BuiltinPrompt {
    async fn template(&self) -> Result<String> {
        Ok(REACT_CHAT_TEMPLATE.to_string())
    }
}

/// A template read from disk.
#[derive(Debug, Clone)]
pub struct FilePrompt {
    path: PathBuf,
}

impl FilePrompt {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PromptSource for FilePrompt {
    async fn template(&self) -> Result<String> {
        let template = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| AgentError::PromptRead {
                path: self.path.display().to_string(),
                source,
            })?;
        validate_template(&template)?;
        Ok(template)
    }
}

/// Rejects templates the executor cannot drive.
pub fn validate_template(template: &str) -> Result<()> {
    match REQUIRED_PLACEHOLDERS
        .iter()
        .find(|placeholder| !template.contains(*placeholder))
    {
        Some(missing) => Err(AgentError::Prompt(format!(
            "template is missing the {} placeholder",
            missing
        ))),
        None => Ok(()),
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub tools: &'a str,
    pub tool_names: &'a str,
    pub chat_history: &'a str,
    pub input: &'a str,
    pub agent_scratchpad: &'a str,
}

/// Fills in a template.
///
/// Substitution is a single pass over the template, so braces inside the
/// substituted values are never treated as placeholders.
pub fn render(template: &str, vars: &PromptVars<'_>) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\{(tools|tool_names|chat_history|input|agent_scratchpad)\}")
            .expect("placeholder pattern is valid")
    });

    re.replace_all(template, |caps: &Captures<'_>| match &caps[1] {
        "tools" => vars.tools,
        "tool_names" => vars.tool_names,
        "chat_history" => vars.chat_history,
        "input" => vars.input,
        _ => vars.agent_scratchpad,
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(input: &'a str, history: &'a str) -> PromptVars<'a> {
        PromptVars {
            tools: "wikipedia_tool: looks things up",
            tool_names: "wikipedia_tool",
            chat_history: history,
            input,
            agent_scratchpad: "",
        }
    }

    #[tokio::test]
    async fn test_builtin_template_is_valid() {
        let template = BuiltinPrompt.template().await.unwrap();
        assert!(validate_template(&template).is_ok());
        assert!(template.contains("{tool_names}"));
    }

    #[test]
    fn test_render_substitutes_everything() {
        let rendered = render(REACT_CHAT_TEMPLATE, &vars("What is BERT?", "Human: hi\nAI: hello"));

        assert!(rendered.contains("wikipedia_tool: looks things up"));
        assert!(rendered.contains("one of [wikipedia_tool]"));
        assert!(rendered.contains("New input: What is BERT?"));
        assert!(rendered.contains("Human: hi\nAI: hello"));
        assert!(!rendered.contains("{input}"));
        assert!(!rendered.contains("{agent_scratchpad}"));
    }

    #[test]
    fn test_render_leaves_user_braces_alone() {
        let rendered = render("{chat_history}|{input}", &vars("say {tools}", "{input}"));
        assert_eq!(rendered, "{input}|say {tools}");
    }

    #[test]
    fn test_validate_rejects_missing_placeholder() {
        let err = validate_template("Answer {input}").unwrap_err();
        assert!(err.to_string().contains("{agent_scratchpad}"));
    }

    #[tokio::test]
    async fn test_file_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Q: {input}\n{agent_scratchpad}").unwrap();

        let template = FilePrompt::new(&path).template().await.unwrap();
        assert!(template.starts_with("Q: "));

        let missing = FilePrompt::new(dir.path().join("nope.txt")).template().await;
        assert!(matches!(missing, Err(AgentError::PromptRead { .. })));
    }
}
