use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use teamflow_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    StructuredResponse, ToolCallRequest,
};
use tracing::Instrument;

use crate::Error;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type ChatResult = Result<ModelResponse, Box<dyn ModelProviderError>>;
type EmbeddingsResult = Result<Vec<f32>, Box<dyn ModelProviderError>>;

trait ProviderObject: Send + Sync + 'static {
    fn chat(&self, req: &ModelRequest) -> BoxedFuture<ChatResult>;

    fn embeddings(&self, input: &str) -> BoxedFuture<EmbeddingsResult>;
}

struct ProviderObjectImpl<P: ModelProvider>(P);

impl<P: ModelProvider + 'static> ProviderObject for ProviderObjectImpl<P> {
    fn chat(&self, req: &ModelRequest) -> BoxedFuture<ChatResult> {
        let fut = self.0.chat(req);
        Box::pin(async move {
            fut.await
                .map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
        })
    }

    fn embeddings(&self, input: &str) -> BoxedFuture<EmbeddingsResult> {
        let fut = self.0.embeddings(input);
        Box::pin(async move {
            fut.await
                .map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
        })
    }
}

/// The answer of a chat round-trip, resolved by the model client.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatOutcome {
    /// The model asked for tool calls.
    ToolCalls(Vec<ToolCallRequest>),
    /// The model answered with one of the requested variants.
    Response(StructuredResponse),
}

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
///
/// Cloning the client is cheap, all clones share the same provider.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn ProviderObject>,
}

impl ModelClient {
    /// Creates a client from a model provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            provider: Arc::new(ProviderObjectImpl(provider)),
        }
    }

    /// Sends a chat request and checks the answer against it.
    ///
    /// Tool calls are only accepted when the request offers tools, and
    /// a structured answer must name a variant of the request's format.
    pub async fn chat(&self, req: ModelRequest) -> Result<ChatOutcome, Error> {
        let fut = self.provider.chat(&req);
        async move {
            trace!("sending a request: {req:?}");
            let resp = fut.await.map_err(|err| {
                error!("got an error: {err:?}");
                Error::provider(err.as_ref())
            })?;
            trace!("got a response: {resp:?}");

            match resp {
                ModelResponse::ToolCalls(calls) if req.tools.is_empty() => {
                    let names: Vec<_> =
                        calls.iter().map(|c| c.name.as_str()).collect();
                    Err(Error::malformed_response().with_reason(format!(
                        "tool calls without tools offered: {names:?}"
                    )))
                }
                ModelResponse::ToolCalls(calls) => {
                    Ok(ChatOutcome::ToolCalls(calls))
                }
                ModelResponse::Structured(resp)
                    if !req.response_format.contains(&resp.kind) =>
                {
                    Err(Error::malformed_response().with_reason(format!(
                        "unexpected response kind `{}`",
                        resp.kind
                    )))
                }
                ModelResponse::Structured(resp) => {
                    Ok(ChatOutcome::Response(resp))
                }
            }
        }
        .instrument(trace_span!("model client req"))
        .await
    }

    /// Computes the embedding vector of the given text.
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, Error> {
        self.provider
            .embeddings(input)
            .await
            .map_err(|err| Error::provider(err.as_ref()))
    }
}

impl Debug for ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient").finish_non_exhaustive()
    }
}

/// Decodes the value of a structured answer.
pub(crate) fn decode<T: DeserializeOwned>(
    resp: StructuredResponse,
) -> Result<T, Error> {
    serde_json::from_value(resp.value).map_err(|err| {
        Error::malformed_response()
            .with_reason(format!("invalid `{}` value: {err}", resp.kind))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use teamflow_model::{
        ErrorKind as ModelErrorKind, ModelMessage, ModelTool, ResponseFormat,
    };
    use teamflow_test_model::{PresetResponse, TestModelProvider};

    use super::*;
    use crate::ErrorKind;

    fn request(tools: Vec<ModelTool>) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools,
            response_format: ResponseFormat::new()
                .with_variant("complete", json!({ "type": "object" })),
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_structured("complete", json!({ "result": "Hey" }));

        let model_client = ModelClient::new(model_provider);
        let outcome = model_client.chat(request(vec![])).await.unwrap();
        let ChatOutcome::Response(resp) = outcome else {
            panic!("expected a structured response");
        };
        assert_eq!(resp.value["result"], "Hey");
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client.chat(request(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider(ModelErrorKind::Other));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_rejects_unrequested_kind() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_structured("select_agent", json!({}));

        let model_client = ModelClient::new(model_provider);
        let err = model_client.chat(request(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_rejects_tool_calls_without_tools() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::tool_calls([
            ToolCallRequest {
                id: "call:1".to_owned(),
                name: "shell".to_owned(),
                arguments: json!({}),
            },
        ]));

        let model_client = ModelClient::new(model_provider);
        let err = model_client.chat(request(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }
}
