//! Parsing of ReAct-formatted model output.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const FINAL_ANSWER: &str = "Final Answer:";

/// What the model asked for on one reasoning step.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    Action(AgentAction),
    Finish(String),
}

/// A tool call parsed out of the model's text.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    pub tool: String,
    pub input: String,
    /// The model text the action was parsed from
    pub log: String,
}

/// Model output that could not be read as an action or final answer.
///
/// The messages are written for the model: they are fed back to it as the
/// observation of the failed step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parsing LLM output produced both a final answer and a parse-able action")]
    Ambiguous,

    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction,

    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,

    #[error("Could not parse LLM output: `{0}`")]
    Unrecognized(String),
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("action pattern is valid")
    })
}

fn action_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action\s*\d*\s*:").expect("action label pattern is valid"))
}

fn action_input_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("action input pattern is valid")
    })
}

/// Reads one step of ReAct output.
///
/// Anything from a model-written `Observation:` onwards is ignored, since
/// observations are ours to supply.
pub fn parse_react_output(text: &str) -> Result<AgentStep, ParseError> {
    let text = text.split("\nObservation:").next().unwrap_or_default();
    let includes_answer = text.contains(FINAL_ANSWER);

    if let Some(captures) = action_regex().captures(text) {
        if includes_answer {
            return Err(ParseError::Ambiguous);
        }

        let tool = captures[1].trim().to_string();
        let input = captures[2]
            .trim()
            .trim_matches('"')
            .trim()
            .to_string();

        return Ok(AgentStep::Action(AgentAction {
            tool,
            input,
            log: text.to_string(),
        }));
    }

    if includes_answer {
        let answer = text.rsplit(FINAL_ANSWER).next().unwrap_or_default().trim();
        return Ok(AgentStep::Finish(answer.to_string()));
    }

    if !action_label_regex().is_match(text) {
        Err(ParseError::MissingAction)
    } else if !action_input_label_regex().is_match(text) {
        Err(ParseError::MissingActionInput)
    } else {
        Err(ParseError::Unrecognized(text.trim().to_string()))
    }
}
