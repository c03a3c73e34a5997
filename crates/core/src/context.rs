//! Observations and the per-iteration prompt built from them.

use std::fmt::Write as _;

use serde::Serialize;

/// What came out of a tool invocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum Outcome {
    /// The tool returned a result.
    Success(String),
    /// The tool could not be resolved, rejected its input, or failed.
    Failure(String),
}

/// The result (or failure) of one action, fed back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Observation {
    /// The action (tool name) that produced this observation.
    pub source_action: String,
    /// The outcome of the action.
    pub outcome: Outcome,
}

impl Observation {
    /// Creates a successful observation.
    #[inline]
    pub fn success<A: Into<String>, S: Into<String>>(action: A, text: S) -> Self {
        Self {
            source_action: action.into(),
            outcome: Outcome::Success(text.into()),
        }
    }

    /// Creates a failed observation.
    #[inline]
    pub fn failure<A: Into<String>, S: Into<String>>(action: A, text: S) -> Self {
        Self {
            source_action: action.into(),
            outcome: Outcome::Failure(text.into()),
        }
    }

    /// Returns `true` if the action succeeded.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// Returns the result or error text.
    #[inline]
    pub fn content(&self) -> &str {
        match &self.outcome {
            Outcome::Success(text) | Outcome::Failure(text) => text,
        }
    }

    /// Renders the observation as one line tagged with its action.
    pub fn render(&self) -> String {
        match &self.outcome {
            Outcome::Success(text) => {
                format!("Result of tool '{}': {}", self.source_action, text)
            }
            Outcome::Failure(text) => {
                format!("Error executing tool '{}': {}", self.source_action, text)
            }
        }
    }
}

/// Builds the user message for the next model call.
///
/// The first iteration gets the task unchanged. Later iterations restate
/// the task followed by every observation in acquisition order. Nothing
/// is ever truncated, the iteration cap bounds the size instead.
pub fn build_context(task: &str, observations: &[Observation]) -> String {
    if observations.is_empty() {
        return task.to_owned();
    }

    let mut context = String::new();
    // Writing to a `String` never fails.
    let _ = write!(
        context,
        "ORIGINAL TASK: {task}\n\nOBSERVATIONS FROM PREVIOUS ACTIONS:\n"
    );
    let rendered = observations
        .iter()
        .map(Observation::render)
        .collect::<Vec<_>>();
    context.push_str(&rendered.join("\n"));
    context
}
