use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ToolCallRequest;

/// An answer matching one variant of the request's response format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResponse {
    /// The variant the model chose.
    pub kind: String,
    /// The value of that variant.
    pub value: Value,
}

/// A response from the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ModelResponse {
    /// The model needs to call tools before it can answer.
    ToolCalls(Vec<ToolCallRequest>),
    /// The model answered with a structured response.
    Structured(StructuredResponse),
}
