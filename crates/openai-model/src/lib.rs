//! A model provider for OpenAI-compatible APIs.
//!
//! Works with the official API as well as self-hosted servers speaking the
//! same `/chat/completions` protocol (vLLM, llama.cpp, Ollama, ...).

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use react_agent_model::{
    ErrorKind, GenerateRequest, ModelProvider, ModelProviderError,
};
use reqwest::{Client, Response, StatusCode, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, ErrorEnvelope};

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    pub fn new(config: OpenAIConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|err| {
            warn!("failed to build a customized HTTP client: {err}");
            Client::new()
        });
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;

    fn generate(
        &self,
        req: &GenerateRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let mut builder = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(api_key) = &self.config.api_key {
            builder =
                builder.header(header::AUTHORIZATION, format!("Bearer {api_key}"));
        }
        let resp_fut = builder.json(&openai_req).send();

        async move {
            let resp = resp_fut.await.map_err(Error::from_reqwest)?;
            let resp = check_status(resp).await?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype() == mime::JSON)
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let completion: ChatCompletion =
                resp.json().await.map_err(Error::from_reqwest)?;
            extract_content(completion)
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ErrorKind::Timeout
        }
        _ => ErrorKind::Other,
    };
    // Prefer the server's explanation if it sent one.
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);
    error!("server responded with {status}: {message}");
    Err(Error::new(format!("HTTP {status}: {message}"), kind))
}

fn extract_content(completion: ChatCompletion) -> Result<String, Error> {
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::new("Response has no choices", ErrorKind::Other));
    };
    trace!("finish reason: {:?}", choice.finish_reason);
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(Error::new(
            "Response was blocked by the content filter",
            ErrorKind::Moderated,
        ));
    }
    match choice.message.content {
        Some(content) => Ok(content.trim().to_owned()),
        None => Err(Error::new("Response has no content", ErrorKind::Other)),
    }
}
