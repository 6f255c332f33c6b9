use serde::{Deserialize, Serialize};
use serde_json::Value;
use teamflow_model::{
    ErrorKind, MessageContent, ModelMessage, ModelRequest, ModelResponse,
    ModelTool, Role, StructuredResponse, ToolCallRequest,
};

use crate::{Error, OpenAIConfig};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: FunctionToolCall,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub refusal: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Embeddings {
    pub data: Vec<Embedding>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Embedding {
    pub embedding: Vec<f32>,
}

/// The envelope structured answers are wrapped in.
#[derive(Deserialize)]
struct Envelope {
    response: StructuredResponse,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: Value,
    strict: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmbeddingsRequest {
    model: String,
    input: String,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        response_format: ResponseFormat {
            r#type: "json_schema",
            json_schema: JsonSchemaFormat {
                name: "task_result",
                schema: req.response_format.json_schema(),
                strict: false,
            },
        },
        temperature: req.temperature,
    }
}

#[inline]
pub fn create_embeddings_request(
    input: &str,
    config: &OpenAIConfig,
) -> EmbeddingsRequest {
    EmbeddingsRequest {
        model: config.embeddings_model.clone(),
        input: input.to_owned(),
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match (msg.role(), msg.content()) {
        (_, MessageContent::ToolCalls { calls, .. }) => Message::Assistant {
            content: None,
            tool_calls: Some(calls.iter().map(create_tool_call).collect()),
        },
        (_, MessageContent::ToolResult(result)) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
        (Role::System, content) => Message::System {
            content: content.to_text().into_owned(),
        },
        (Role::Assistant, content) => Message::Assistant {
            content: Some(content.to_text().into_owned()),
            tool_calls: None,
        },
        // Tool messages always carry a result, so anything else left is
        // treated as a user input.
        (Role::User | Role::Tool, content) => Message::User {
            content: content.to_text().into_owned(),
        },
    }
}

fn create_tool_call(call: &ToolCallRequest) -> ToolCall {
    ToolCall {
        id: call.id.clone(),
        r#type: "function".to_owned(),
        function: FunctionToolCall {
            name: call.name.clone(),
            arguments: call.arguments.to_string(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Converts the server's answer into a [`ModelResponse`].
///
/// Tool calls win over any text the model produced alongside them.
pub fn parse_completion(
    completion: ChatCompletion,
) -> Result<ModelResponse, Error> {
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::new("No choices in completion", ErrorKind::Other));
    };
    let message = choice.message;

    if let Some(tool_calls) = message.tool_calls.filter(|c| !c.is_empty()) {
        let calls = tool_calls
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                // Malformed arguments are kept as a raw string, so that the
                // tool executor reports them back to the model.
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
            })
            .collect();
        return Ok(ModelResponse::ToolCalls(calls));
    }

    if let Some(refusal) = message.refusal {
        return Err(Error::new(refusal, ErrorKind::Moderated));
    }

    let Some(content) = message.content else {
        return Err(Error::new("No response in message", ErrorKind::Other));
    };
    let envelope: Envelope = serde_json::from_str(&content).map_err(|err| {
        Error::new(format!("Malformed response: {err}"), ErrorKind::Other)
    })?;
    Ok(ModelResponse::Structured(envelope.response))
}
