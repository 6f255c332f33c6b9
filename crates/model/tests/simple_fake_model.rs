use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;

use serde_json::json;
use teamflow_model::{
    ErrorKind, MessageContent, ModelMessage, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelTool, ResponseFormat, StructuredResponse,
    ToolCallRequest,
};

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last user message, or calls the first tool it is offered.
struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;

    fn chat(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            let Some(last) = req.messages.last() else {
                break 'blk Err(FakeModelProviderError(ErrorKind::Other));
            };
            if let Some(tool) = req.tools.first() {
                break 'blk Ok(ModelResponse::ToolCalls(vec![ToolCallRequest {
                    id: "call:0".to_owned(),
                    name: tool.name.clone(),
                    arguments: json!({}),
                }]));
            }
            let Some(variant) = req.response_format.variants().first() else {
                break 'blk Err(FakeModelProviderError(ErrorKind::Moderated));
            };
            let text = match last.content() {
                MessageContent::Text(text) => text.clone(),
                other => unreachable!("unexpected content: {other:?}"),
            };
            Ok(ModelResponse::Structured(StructuredResponse {
                kind: variant.kind.clone(),
                value: json!({ "result": format!("You said {text}") }),
            }))
        };
        ready(result)
    }

    fn embeddings(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static
    {
        ready(Ok(vec![input.len() as f32]))
    }
}

fn request(messages: Vec<ModelMessage>, tools: Vec<ModelTool>) -> ModelRequest {
    ModelRequest {
        messages,
        tools,
        response_format: ResponseFormat::new().with_variant(
            "complete",
            json!({
                "type": "object",
                "properties": { "result": { "type": "string" } }
            }),
        ),
        temperature: None,
    }
}

#[tokio::test]
async fn test_structured_response() {
    let provider = FakeModelProvider;
    let req = request(vec![ModelMessage::user("Good morning")], vec![]);
    let resp = provider.chat(&req).await.unwrap();

    let ModelResponse::Structured(resp) = resp else {
        panic!("expected a structured response");
    };
    assert_eq!(resp.kind, "complete");
    assert_eq!(resp.value["result"], "You said Good morning");
}

#[tokio::test]
async fn test_tool_calls_take_priority() {
    let provider = FakeModelProvider;
    let req = request(
        vec![ModelMessage::user("Read my notes")],
        vec![ModelTool {
            name: "read_notes".to_owned(),
            description: "Reads the notes".to_owned(),
            parameters: json!({ "type": "object" }),
        }],
    );
    let resp = provider.chat(&req).await.unwrap();
    assert!(matches!(
        resp,
        ModelResponse::ToolCalls(calls) if calls[0].name == "read_notes"
    ));
}

#[tokio::test]
async fn test_error() {
    let provider = FakeModelProvider;
    let req = request(vec![], vec![]);
    let err = provider.chat(&req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[tokio::test]
async fn test_embeddings() {
    let provider = FakeModelProvider;
    let vector = provider.embeddings("four").await.unwrap();
    assert_eq!(vector, vec![4.0]);
}
