use std::error::Error;

use crate::error::ErrorKind;
use crate::request::GenerateRequest;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a model provider, which turns a prompt and the
/// conversation so far into the next assistant text.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Generates the assistant reply for the request.
    ///
    /// The returned future must not borrow from `self` or `req`, so that
    /// the caller can race it against a deadline or drop it at any time.
    fn generate(
        &self,
        req: &GenerateRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;
}
