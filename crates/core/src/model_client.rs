use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use react_agent_model::{
    ErrorKind, GenerateRequest, ModelProvider, ModelProviderError,
};
use tokio::time::timeout;
use tracing::Instrument;

type GenerateResult = Result<String, Box<dyn ModelProviderError>>;
type BoxedGenerateFuture = Pin<Box<dyn Future<Output = GenerateResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(&GenerateRequest) -> BoxedGenerateFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules, and optionally bounds every call with a deadline.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    timeout: Option<Duration>,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            trace!("got a request: {:?}", req);
            let fut = provider.generate(req);
            Box::pin(
                async move {
                    fut.await.map_err(|err| {
                        error!("got an error: {err:?}");
                        Box::new(err) as Box<dyn ModelProviderError>
                    })
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            timeout: None,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generates the next assistant text.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The provider future is dropped when
    /// this operation is cancelled or the deadline expires.
    pub async fn generate(&self, req: &GenerateRequest) -> GenerateResult {
        let fut = (self.handler_fn)(req);
        let Some(limit) = self.timeout else {
            return fut.await;
        };
        match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!("model did not respond within {limit:?}");
                Err(Box::new(DeadlineExceeded(limit)))
            }
        }
    }
}

/// The model did not answer in time.
#[derive(Debug)]
struct DeadlineExceeded(Duration);

impl Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model did not respond within {} ms", self.0.as_millis())
    }
}

impl StdError for DeadlineExceeded {}

impl ModelProviderError for DeadlineExceeded {
    #[inline]
    fn kind(&self) -> ErrorKind {
        ErrorKind::Timeout
    }
}

#[cfg(test)]
mod tests {
    use react_agent_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            system_prompt: "system".to_owned(),
            user_message: "Hi".to_owned(),
            history: vec![],
        }
    }

    #[tokio::test]
    async fn test_generate() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response_step(PresetResponse::with_text("How are you?"));
        let model_client = ModelClient::new(model_provider.clone());

        for _ in 0..3 {
            let reply = model_client.generate(&request()).await.unwrap();
            assert_eq!(reply, "How are you?");
        }
        assert_eq!(model_provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let err = model_client.generate(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response_step(PresetResponse::with_text("late"));
        model_provider.set_delay(Duration::from_secs(60));

        let model_client = ModelClient::new(model_provider.clone())
            .with_timeout(Some(Duration::from_secs(5)));
        let err = model_client.generate(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "model did not respond within 5000 ms");

        let model_client = model_client.with_timeout(Some(Duration::from_secs(120)));
        assert_eq!(model_client.generate(&request()).await.unwrap(), "late");
    }
}
