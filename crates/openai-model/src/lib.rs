//! A model provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use teamflow_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, Embeddings};

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
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.config.base_url, path))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;

    fn chat(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self.post("/chat/completions").json(&openai_req).send();

        async move {
            let completion: ChatCompletion = read_json(resp_fut.await).await?;
            trace!("got a completion: {completion:?}");
            proto::parse_completion(completion)
        }
    }

    fn embeddings(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_embeddings_request(input, &self.config);
        let resp_fut = self.post("/embeddings").json(&openai_req).send();

        async move {
            let embeddings: Embeddings = read_json(resp_fut.await).await?;
            embeddings
                .data
                .into_iter()
                .next()
                .map(|e| e.embedding)
                .ok_or_else(|| {
                    Error::new("No embedding data", ErrorKind::Other)
                })
        }
    }
}

async fn read_json<T: DeserializeOwned>(
    resp_or_err: reqwest::Result<Response>,
) -> Result<T, Error> {
    let resp = resp_or_err
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;

    let status = resp.status();
    if !status.is_success() {
        let kind = if status == StatusCode::TOO_MANY_REQUESTS {
            ErrorKind::RateLimitExceeded
        } else {
            ErrorKind::Other
        };
        let body = resp.text().await.unwrap_or_default();
        warn!("request failed with {status}: {body}");
        return Err(Error::new(format!("{status}: {body}"), kind));
    }

    resp.json()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))
}
