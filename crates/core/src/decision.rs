//! The structured decision a model emits on every iteration.
//!
//! Models are asked to reply with a single JSON object:
//!
//! ```json
//! {
//!   "thought": "reasoning about the next step",
//!   "action": "tool_name" | "ANSWER" | "ABORT",
//!   "action_input": { "param": "value" },
//!   "answer": "final answer for the user"
//! }
//! ```
//!
//! In practice they often wrap the object in prose or markdown fences, so
//! the parser looks for the first balanced object in the text instead of
//! requiring the whole reply to be JSON.

use std::fmt::{self, Display};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

const ANSWER: &str = "ANSWER";
const ABORT: &str = "ABORT";

/// Errors that can occur while parsing a decision.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// The model output contains no balanced `{...}` object.
    #[error("no decision object found in model output: {0}")]
    NoDecisionFound(String),
    /// The object is not valid JSON or has fields of the wrong type.
    #[error("malformed decision object: {0}")]
    Malformed(String),
    /// A required field is absent.
    #[error("decision is missing required field `{0}`")]
    MissingField(&'static str),
}

/// The next step chosen by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Terminate with the decision's answer.
    Answer,
    /// Give up.
    Abort,
    /// Invoke the named tool.
    Tool(String),
}

impl Action {
    fn from_name(name: String) -> Self {
        match name.as_str() {
            ANSWER => Action::Answer,
            ABORT => Action::Abort,
            _ => Action::Tool(name),
        }
    }

    /// Returns the action name as written by the model.
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Action::Answer => ANSWER,
            Action::Abort => ABORT,
            Action::Tool(name) => name,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated decision.
///
/// If `action` is [`Action::Answer`], `answer` is guaranteed to be present.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// The model's reasoning, never empty.
    pub thought: String,
    /// What to do next.
    pub action: Action,
    /// Tool arguments, if any.
    pub action_input: Option<Map<String, Value>>,
    /// The final answer.
    pub answer: Option<String>,
}

#[derive(Deserialize)]
struct RawDecision {
    thought: Option<String>,
    action: Option<String>,
    action_input: Option<Map<String, Value>>,
    answer: Option<String>,
}

impl Decision {
    /// Extracts and validates a decision from raw model output.
    pub fn parse(text: &str) -> Result<Self, DecisionError> {
        let Some(span) = find_object_span(text) else {
            return Err(DecisionError::NoDecisionFound(text.trim().to_owned()));
        };

        let raw: RawDecision = serde_json::from_str(span)
            .map_err(|err| DecisionError::Malformed(err.to_string()))?;

        let thought = raw
            .thought
            .filter(|thought| !thought.trim().is_empty())
            .ok_or(DecisionError::MissingField("thought"))?;
        let action = raw
            .action
            .filter(|action| !action.trim().is_empty())
            .map(Action::from_name)
            .ok_or(DecisionError::MissingField("action"))?;
        if action == Action::Answer && raw.answer.is_none() {
            return Err(DecisionError::MissingField("answer"));
        }

        Ok(Self {
            thought,
            action,
            action_input: raw.action_input,
            answer: raw.answer,
        })
    }

    /// Returns `true` if this decision ends the run.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.action, Action::Answer | Action::Abort)
    }
}

/// Locates the first balanced `{...}` span, skipping braces that appear
/// inside JSON strings.
fn find_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
