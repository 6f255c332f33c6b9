use serde::{Deserialize, Serialize};
use serde_json::Value;
use teamflow_model::{ModelResponse, StructuredResponse, ToolCallRequest};

/// What a preset step answers with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetOutcome {
    #[serde(rename = "structured")]
    Structured { kind: String, value: Value },
    #[serde(rename = "tool_calls")]
    ToolCalls(Vec<ToolCallRequest>),
}

impl From<PresetOutcome> for ModelResponse {
    fn from(outcome: PresetOutcome) -> Self {
        match outcome {
            PresetOutcome::Structured { kind, value } => {
                ModelResponse::Structured(StructuredResponse { kind, value })
            }
            PresetOutcome::ToolCalls(calls) => ModelResponse::ToolCalls(calls),
        }
    }
}

/// The preset response for one chat request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// The answer of this step.
    pub outcome: PresetOutcome,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` answering with a structured value.
    #[inline]
    pub fn structured<S: Into<String>>(kind: S, value: Value) -> Self {
        Self {
            outcome: PresetOutcome::Structured {
                kind: kind.into(),
                value,
            },
            failures: None,
        }
    }

    /// Creates a `PresetResponse` asking for the specified tool calls.
    #[inline]
    pub fn tool_calls(calls: impl Into<Vec<ToolCallRequest>>) -> Self {
        Self {
            outcome: PresetOutcome::ToolCalls(calls.into()),
            failures: None,
        }
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::tool_calls([ToolCallRequest {
            id: "1".to_string(),
            name: "write_file".to_string(),
            arguments: json!({
                "filename": "message.txt",
                "content": "Hello, world!"
            }),
        }])
        .with_failures(2);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}
