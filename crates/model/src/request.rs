use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GenerateRequest {
    /// The system instructions.
    pub system_prompt: String,
    /// The message the model should respond to in this turn.
    pub user_message: String,
    /// Prior turns of the conversation, oldest first.
    ///
    /// The `user_message` is not part of the history.
    pub history: Vec<Turn>,
}

/// The author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text produced by the model.
    Assistant,
    /// Text fed to the model on behalf of the user.
    User,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Assistant => write!(f, "assistant"),
            Role::User => write!(f, "user"),
        }
    }
}

/// A complete message in the conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// Text of this turn.
    pub content: String,
}

impl Turn {
    /// Creates an assistant turn.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a user turn.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_wire_format() {
        let turn = Turn::assistant("{\"thought\":\"t\"}");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"], "{\"thought\":\"t\"}");
    }
}
