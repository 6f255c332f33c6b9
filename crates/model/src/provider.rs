use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a model provider, which is an entry for
/// sampling chat requests and computing embeddings.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Sends a chat request to the model.
    ///
    /// When the request offers tools and the model decides to call some
    /// of them, the provider must return [`ModelResponse::ToolCalls`]
    /// even if the model also produced text. Otherwise, the answer must
    /// be one of the variants declared by the request's response format.
    fn chat(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static;

    /// Computes the embedding vector of the given text.
    fn embeddings(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static;
}
