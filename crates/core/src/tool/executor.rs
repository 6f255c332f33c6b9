use std::future::ready;
use std::pin::Pin;

use futures_util::future::join_all;
use teamflow_model::{ModelMessage, ToolCallRequest};
use tracing::Instrument;

use crate::tool::{Error, ToolRegistry, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

impl ToolRegistry {
    /// Executes the tool calls of one pause and returns their results
    /// as tool messages, in the order of the requests.
    ///
    /// Calls run concurrently and independently: an unknown tool, invalid
    /// arguments, a failed or even a panicked execution only affect the
    /// result of that call. Failures are reported as the content of the
    /// tool message, so the model can react to them in its next turn.
    pub async fn run_tools(
        &self,
        requests: Vec<ToolCallRequest>,
    ) -> Vec<ModelMessage> {
        let (ids, tasks) = {
            let span = debug_span!("tool executor");
            let _enter = span.enter();

            let mut ids = Vec::with_capacity(requests.len());
            let mut tasks = Vec::with_capacity(requests.len());
            for req in requests {
                let fut: BoxedToolFuture = match self.tools.get(&req.name) {
                    Some(tool) => {
                        trace!(
                            "spawning a tool ({}) with args: {:?}",
                            req.id, req.arguments
                        );
                        tool.execute(req.arguments)
                    }
                    None => {
                        warn!("tool not found: {}", req.name);
                        let reason =
                            format!("`{}` is not available", req.name);
                        Box::pin(ready(Err(
                            Error::not_found().with_reason(reason)
                        )))
                    }
                };
                let task_span = debug_span!("tool execute", id = %req.id);
                tasks.push(tokio::spawn(fut.instrument(task_span)));
                ids.push(req.id);
            }
            (ids, tasks)
        };

        join_all(tasks)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, id)| {
                let result: ToolResult = joined.unwrap_or_else(|err| {
                    error!("tool ({id}) did not complete: {err}");
                    Err(Error::execution_error()
                        .with_reason("the tool crashed while running"))
                });
                let content = match result {
                    Ok(output) => output,
                    Err(err) => {
                        debug!("tool ({id}) failed: {err}");
                        err.to_string()
                    }
                };
                ModelMessage::tool_result(id, content)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use schemars::{JsonSchema, schema_for};
    use serde::Deserialize;
    use serde_json::{Value, json};
    use teamflow_model::{MessageContent, Role};

    use super::*;
    use crate::tool::Tool;

    #[derive(Deserialize, JsonSchema)]
    struct EchoParameters {
        text: String,
        delay_ms: Option<u64>,
    }

    struct EchoTool {
        parameter_schema: Value,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                parameter_schema: schema_for!(EchoParameters).to_value(),
            }
        }
    }

    impl Tool for EchoTool {
        type Input = EchoParameters;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the text back"
        }

        fn parameter_schema(&self) -> &Value {
            &self.parameter_schema
        }

        #[allow(clippy::manual_async_fn)]
        fn execute(
            &self,
            input: EchoParameters,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async move {
                if let Some(delay) = input.delay_ms {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                if input.text.is_empty() {
                    return Err(Error::execution_error()
                        .with_reason("nothing to echo"));
                }
                Ok(input.text)
            }
        }
    }

    static EMPTY_SCHEMA: &Value = &Value::Null;

    struct PanickingTool;

    impl Tool for PanickingTool {
        type Input = Value;

        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        #[allow(clippy::manual_async_fn)]
        fn execute(
            &self,
            _input: Value,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async move { panic!("boom") }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        registry.add_tool(EchoTool::new());
        registry.add_tool(PanickingTool);
        registry
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    fn result_of(msg: &ModelMessage) -> (&str, &str) {
        assert_eq!(msg.role(), Role::Tool);
        match msg.content() {
            MessageContent::ToolResult(result) => {
                (result.id.as_str(), result.content.as_str())
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn test_definitions() {
        let definitions = registry().definitions();
        let names: Vec<_> =
            definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["echo", "explode"]);
        assert_eq!(definitions[0].parameters["type"], "object");
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let results = registry()
            .run_tools(vec![
                call(
                    "tool:1",
                    "echo",
                    json!({ "text": "slow", "delay_ms": 30 }),
                ),
                call("tool:2", "echo", json!({ "text": "fast" })),
            ])
            .await;

        assert_eq!(result_of(&results[0]), ("tool:1", "slow"));
        assert_eq!(result_of(&results[1]), ("tool:2", "fast"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let results = registry()
            .run_tools(vec![
                call("tool:1", "echo", json!({ "text": 42 })),
                call("tool:2", "read_file", json!({})),
                call("tool:3", "echo", json!({ "text": "" })),
                call("tool:4", "explode", json!({})),
                call("tool:5", "echo", json!({ "text": "still here" })),
            ])
            .await;

        assert_eq!(results.len(), 5);
        let (_, content) = result_of(&results[0]);
        assert!(content.starts_with("Invalid input"), "{content}");
        let (_, content) = result_of(&results[1]);
        assert!(content.starts_with("Tool not found"), "{content}");
        let (_, content) = result_of(&results[2]);
        assert_eq!(content, "Execution error: nothing to echo");
        let (_, content) = result_of(&results[3]);
        assert!(content.starts_with("Execution error"), "{content}");
        assert_eq!(result_of(&results[4]), ("tool:5", "still here"));
    }
}
