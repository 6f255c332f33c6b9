//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use teamflow_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};
use tokio::time::sleep;

pub use preset::*;

const EMBEDDING_DIMENSIONS: usize = 8;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<PresetResponse>,
    failed_attempts: u64,
    requests: Vec<ModelRequest>,
}

impl Script {
    fn next_response(&mut self) -> Result<ModelResponse, Error> {
        let Some(step) = self.steps.front() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        match step.failures {
            Some(0) => {
                return Err(Error {
                    message: "injected failure",
                    kind: ErrorKind::Other,
                });
            }
            Some(failures) if self.failed_attempts < failures => {
                self.failed_attempts += 1;
                return Err(Error {
                    message: "injected failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }

        self.failed_attempts = 0;
        let step = self.steps.pop_front().map(|step| step.outcome);
        step.map(ModelResponse::from).ok_or(Error {
            message: "no enough steps",
            kind: ErrorKind::Other,
        })
    }
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to requests. Steps are consumed in the order they
/// were added, no matter what the request contains. If there are no enough
/// steps in the script, an error will be returned.
///
/// Clones share the same script, so a test can keep a clone around to
/// inspect the requests after handing the provider to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) -> &mut Self {
        self.script().steps.push_back(preset);
        self
    }

    /// Answers with a structured value of the given kind.
    #[inline]
    pub fn add_structured(
        &mut self,
        kind: &str,
        value: serde_json::Value,
    ) -> &mut Self {
        self.add_response(PresetResponse::structured(kind, value))
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script().requests.clone()
    }

    /// Returns the number of steps that have not been consumed yet.
    pub fn remaining_steps(&self) -> usize {
        self.script().steps.len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Debug for TestModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModelProvider")
            .field("remaining_steps", &self.remaining_steps())
            .field("delay", &self.delay)
            .finish()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn chat(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let result = {
            let mut script = self.script();
            script.requests.push(req.clone());
            script.next_response()
        };
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }

    fn embeddings(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static
    {
        // Folds the bytes into a fixed number of buckets, which is enough
        // for similarity checks in tests.
        let mut vector = vec![0.0; EMBEDDING_DIMENSIONS];
        for (idx, byte) in input.bytes().enumerate() {
            vector[idx % EMBEDDING_DIMENSIONS] += f32::from(byte) / 255.0;
        }
        std::future::ready(Ok(vector))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use teamflow_model::{
        ModelMessage, ModelTool, ResponseFormat, ToolCallRequest,
    };

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![ModelTool {
                name: "read_file".to_owned(),
                description: "Reads a file".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filename": {
                            "type": "string",
                            "description": "The name of the file to read"
                        }
                    }
                }),
            }],
            response_format: ResponseFormat::new()
                .with_variant("complete", json!({ "type": "object" })),
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_steps_are_consumed_in_order() {
        let mut provider = TestModelProvider::default();
        provider.add_structured("complete", json!({ "result": "Hello" }));
        provider.add_response(PresetResponse::tool_calls([ToolCallRequest {
            id: "tool:1".to_owned(),
            name: "read_file".to_owned(),
            arguments: json!({ "filename": "todo.txt" }),
        }]));

        let resp = provider.chat(&request()).await.unwrap();
        assert!(matches!(
            resp,
            ModelResponse::Structured(ref s) if s.value["result"] == "Hello"
        ));

        let resp = provider.chat(&request()).await.unwrap();
        let ModelResponse::ToolCalls(calls) = resp else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].arguments, json!({ "filename": "todo.txt" }));

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.remaining_steps(), 0);

        let err = provider.chat(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_response(
            PresetResponse::structured("complete", json!({})).with_failures(2),
        );

        assert!(provider.chat(&request()).await.is_err());
        assert!(provider.chat(&request()).await.is_err());
        assert!(provider.chat(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_infinite_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_response(
            PresetResponse::structured("complete", json!({})).with_failures(0),
        );

        for _ in 0..5 {
            assert!(provider.chat(&request()).await.is_err());
        }
        assert_eq!(provider.remaining_steps(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_secs(3));
        provider.add_structured("complete", json!({}));

        let started = tokio::time::Instant::now();
        provider.chat(&request()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let provider = TestModelProvider::default();
        let a = provider.embeddings("hello").await.unwrap();
        let b = provider.embeddings("hello").await.unwrap();
        assert_eq!(a.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(a, b);
    }
}
