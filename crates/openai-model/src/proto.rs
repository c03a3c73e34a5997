use react_agent_model::{GenerateRequest, Role, Turn};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// -----------
// Conversions
// -----------

/// Lays out the request as system prompt, history, then the user message.
#[inline]
pub fn create_request(
    req: &GenerateRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(req.history.len() + 2);
    messages.push(Message::System {
        content: req.system_prompt.clone(),
    });
    messages.extend(req.history.iter().map(create_message));
    messages.push(Message::User {
        content: req.user_message.clone(),
    });

    ChatCompletionRequest {
        model: config.model.clone(),
        messages,
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: config.max_tokens,
        stream: false,
    }
}

#[inline]
fn create_message(turn: &Turn) -> Message {
    let content = turn.content.clone();
    match turn.role {
        Role::Assistant => Message::Assistant { content },
        Role::User => Message::User { content },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = GenerateRequest {
            system_prompt: "You are a helpful assistant.".to_owned(),
            user_message: "ORIGINAL TASK: Hello".to_owned(),
            history: vec![
                Turn::assistant("{\"thought\":\"t\",\"action\":\"clock\"}"),
                Turn::user("OBSERVATION: Result of tool 'clock': noon"),
            ],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .with_temperature(0.7)
            .build();
        let expected = ChatCompletionRequest {
            model: "custom".to_owned(),
            messages: vec![
                Message::System {
                    content: "You are a helpful assistant.".to_owned(),
                },
                Message::Assistant {
                    content: "{\"thought\":\"t\",\"action\":\"clock\"}".to_owned(),
                },
                Message::User {
                    content: "OBSERVATION: Result of tool 'clock': noon"
                        .to_owned(),
                },
                Message::User {
                    content: "ORIGINAL TASK: Hello".to_owned(),
                },
            ],
            temperature: Some(0.7),
            top_p: None,
            max_tokens: None,
            stream: false,
        };
        let openai_req = create_request(&request, &config);
        assert_eq!(openai_req, expected);

        let value = serde_json::to_value(&openai_req).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert!(value.get("top_p").is_none());
        assert_eq!(value["stream"], json!(false));
    }

    #[test]
    fn test_parse_completion() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "{\"thought\":\"t\"}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2 }
        }))
        .unwrap();
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("{\"thought\":\"t\"}")
        );
        assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
